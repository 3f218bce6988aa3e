//! Resolves `{{ $input.<path> }}` / `{{ $vars.<name> }}` /
//! `{{ $output.<node_id>.<path> }}` references inside a node's `config`
//! against the current input, execution variables, and upstream outputs.
//!
//! Unresolved references are a node failure (`TemplateError`), never a
//! silent no-op — a workflow author who typos a variable name should see
//! that immediately rather than have the node receive a literal
//! `"{{ $vars.typo }}"` string.

use std::collections::HashMap;

use kestrel_core::NodeId;
use serde_json::{Map, Value};

use crate::error::EngineError;

/// The scope a `config` value's templates are resolved against for one
/// node dispatch.
pub struct TemplateContext<'a> {
    /// The node's resolved input (predecessor outputs merged, or the
    /// execution's top-level input for entry nodes).
    pub input: &'a Value,
    /// Execution-scoped variables.
    pub vars: &'a Map<String, Value>,
    /// Every upstream node's published output, keyed by node id.
    pub outputs: &'a HashMap<NodeId, Value>,
}

/// Walk a recursive `config` value, resolving every string leaf that
/// contains a `{{ ... }}` reference.
///
/// # Errors
/// Returns [`EngineError::Template`] if any reference cannot be resolved.
pub fn resolve_templates(value: &Value, ctx: &TemplateContext<'_>) -> Result<Value, EngineError> {
    match value {
        Value::String(s) => resolve_string(s, ctx),
        Value::Array(items) => {
            let resolved: Result<Vec<Value>, EngineError> =
                items.iter().map(|v| resolve_templates(v, ctx)).collect();
            Ok(Value::Array(resolved?))
        }
        Value::Object(map) => {
            let mut resolved = Map::with_capacity(map.len());
            for (k, v) in map {
                resolved.insert(k.clone(), resolve_templates(v, ctx)?);
            }
            Ok(Value::Object(resolved))
        }
        other => Ok(other.clone()),
    }
}

fn resolve_string(s: &str, ctx: &TemplateContext<'_>) -> Result<Value, EngineError> {
    let spans = scan_templates(s);
    if spans.is_empty() {
        return Ok(Value::String(s.to_owned()));
    }

    if spans.len() == 1 && spans[0].0 == 0 && spans[0].1 == s.len() {
        return resolve_expr(&spans[0].2, ctx);
    }

    let mut out = String::with_capacity(s.len());
    let mut cursor = 0;
    for (start, end, expr) in &spans {
        out.push_str(&s[cursor..*start]);
        let resolved = resolve_expr(expr, ctx)?;
        match resolved {
            Value::String(inner) => out.push_str(&inner),
            other => out.push_str(&other.to_string()),
        }
        cursor = *end;
    }
    out.push_str(&s[cursor..]);
    Ok(Value::String(out))
}

/// Find every `{{ ... }}` span in `s`, returning `(start, end, trimmed_expr)`
/// byte ranges. Does not support nested braces.
fn scan_templates(s: &str) -> Vec<(usize, usize, String)> {
    let mut spans = Vec::new();
    let mut cursor = 0;
    while let Some(rel_start) = s[cursor..].find("{{") {
        let start = cursor + rel_start;
        let body_start = start + 2;
        let Some(rel_end) = s[body_start..].find("}}") else {
            break;
        };
        let body_end = body_start + rel_end;
        let end = body_end + 2;
        spans.push((start, end, s[body_start..body_end].trim().to_owned()));
        cursor = end;
    }
    spans
}

fn resolve_expr(expr: &str, ctx: &TemplateContext<'_>) -> Result<Value, EngineError> {
    let mut segments = expr.split('.');
    let root = segments
        .next()
        .ok_or_else(|| EngineError::Template(format!("empty template expression `{{{{ {expr} }}}}`")))?;

    let root_value = match root {
        "$input" => ctx.input.clone(),
        "$vars" => {
            let name = segments
                .next()
                .ok_or_else(|| EngineError::Template(format!("`$vars` reference missing a name: `{{{{ {expr} }}}}`")))?;
            ctx.vars
                .get(name)
                .cloned()
                .ok_or_else(|| EngineError::Template(format!("unresolved variable `{name}` in `{{{{ {expr} }}}}`")))?
        }
        "$output" => {
            let node_ref = segments
                .next()
                .ok_or_else(|| EngineError::Template(format!("`$output` reference missing a node id: `{{{{ {expr} }}}}`")))?;
            ctx.outputs
                .iter()
                .find(|(id, _)| id.to_string() == node_ref)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| {
                    EngineError::Template(format!("unresolved output reference to node `{node_ref}` in `{{{{ {expr} }}}}`"))
                })?
        }
        other => {
            return Err(EngineError::Template(format!(
                "unknown template root `{other}` in `{{{{ {expr} }}}}`"
            )))
        }
    };

    let remaining: Vec<&str> = segments.collect();
    follow_path(&root_value, &remaining)
        .ok_or_else(|| EngineError::Template(format!("path not found for `{{{{ {expr} }}}}`")))
}

fn follow_path(value: &Value, segments: &[&str]) -> Option<Value> {
    let mut current = value.clone();
    for segment in segments {
        current = match &current {
            Value::Object(map) => map.get(*segment)?.clone(),
            Value::Array(items) => {
                let idx: usize = segment.parse().ok()?;
                items.get(idx)?.clone()
            }
            _ => return None,
        };
    }
    Some(current)
}
