//! Static, declared shape of a node type: its config fields, the
//! credential types it needs, and the output handles it can select.

use serde::{Deserialize, Serialize};

/// The small schema language node config fields are validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// A UTF-8 string.
    String,
    /// Any JSON number.
    Number,
    /// `true` or `false`.
    Boolean,
    /// One of a fixed set of string values (see [`FieldSchema::options`]).
    Select,
    /// A reference to a credential, resolved by the supervisor — never a
    /// literal secret value in the workflow definition itself.
    SecretRef,
    /// A string containing handler-interpreted code (e.g. a script body).
    CodeString,
}

/// The declared shape of one config field a node handler reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    /// The key this field is read from in a node's `config` object.
    pub name: String,
    /// The expected value shape.
    pub field_type: FieldType,
    /// Whether the Compiler should reject a node missing this field.
    pub required: bool,
    /// Allowed values when `field_type` is [`FieldType::Select`].
    #[serde(default)]
    pub options: Vec<String>,
}

impl FieldSchema {
    /// Declare a required field.
    #[must_use]
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            options: Vec::new(),
        }
    }

    /// Declare an optional field.
    #[must_use]
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            options: Vec::new(),
        }
    }

    /// Attach the allowed values for a [`FieldType::Select`] field.
    #[must_use]
    pub fn with_options(mut self, options: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}

/// Static metadata describing a node type, used by the Compiler for
/// validation and by the Node Handler Registry for discovery.
#[derive(Debug, Clone)]
pub struct NodeMetadata {
    /// Unique key resolved against a workflow node's `type_tag`
    /// (e.g. `"http.request"`).
    pub type_tag: String,
    /// Human-readable display name.
    pub name: String,
    /// Short description of what this node does.
    pub description: String,
    /// Config fields this handler reads, used for `config` shape validation.
    pub declared_fields: Vec<FieldSchema>,
    /// Credential-type tags this handler may need bound via `credential_refs`.
    pub declared_credentials: Vec<String>,
    /// Output handle names this handler may select in a [`crate::NodeResult`].
    /// Always includes `"default"` implicitly even if not listed.
    pub declared_outputs: Vec<String>,
    /// `true` if this node type is allowed to carry a cycle (e.g. `loop`,
    /// `split_in_batches`). The Compiler only accepts a multi-node strongly
    /// connected component if at least one of its nodes is loop-carrying.
    pub is_loop_carrying: bool,
}

impl NodeMetadata {
    /// Create metadata with no declared fields, credentials, or extra
    /// output handles (just the implicit `"default"`).
    #[must_use]
    pub fn new(
        type_tag: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            type_tag: type_tag.into(),
            name: name.into(),
            description: description.into(),
            declared_fields: Vec::new(),
            declared_credentials: Vec::new(),
            declared_outputs: Vec::new(),
            is_loop_carrying: false,
        }
    }

    /// Mark this node type as allowed to carry a cycle.
    #[must_use]
    pub fn loop_carrying(mut self) -> Self {
        self.is_loop_carrying = true;
        self
    }

    /// Add a declared config field.
    #[must_use]
    pub fn with_field(mut self, field: FieldSchema) -> Self {
        self.declared_fields.push(field);
        self
    }

    /// Add a declared credential-type requirement.
    #[must_use]
    pub fn with_credential(mut self, credential_type: impl Into<String>) -> Self {
        self.declared_credentials.push(credential_type.into());
        self
    }

    /// Add a declared output handle beyond the implicit `"default"`.
    #[must_use]
    pub fn with_output(mut self, handle: impl Into<String>) -> Self {
        self.declared_outputs.push(handle.into());
        self
    }

    /// All output handles this handler may select, including the implicit
    /// `"default"`.
    #[must_use]
    pub fn all_output_handles(&self) -> Vec<&str> {
        let mut handles = vec!["default"];
        handles.extend(self.declared_outputs.iter().map(String::as_str));
        handles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_fields() {
        let meta = NodeMetadata::new("http.request", "HTTP Request", "Make HTTP calls")
            .with_field(FieldSchema::required("url", FieldType::String))
            .with_field(FieldSchema::optional("timeout_ms", FieldType::Number))
            .with_credential("http_bearer")
            .with_output("error");

        assert_eq!(meta.declared_fields.len(), 2);
        assert!(meta.declared_fields[0].required);
        assert!(!meta.declared_fields[1].required);
        assert_eq!(meta.declared_credentials, vec!["http_bearer"]);
        assert_eq!(meta.declared_outputs, vec!["error"]);
        assert!(!meta.is_loop_carrying);
    }

    #[test]
    fn loop_carrying_flag() {
        let meta = NodeMetadata::new("loop", "Loop", "Iterate").loop_carrying();
        assert!(meta.is_loop_carrying);
    }

    #[test]
    fn all_output_handles_includes_implicit_default() {
        let meta = NodeMetadata::new("if", "If", "Branch").with_output("true").with_output("false");
        assert_eq!(meta.all_output_handles(), vec!["default", "true", "false"]);
    }

    #[test]
    fn select_field_with_options() {
        let field = FieldSchema::required("method", FieldType::Select)
            .with_options(["GET", "POST", "PUT"]);
        assert_eq!(field.options, vec!["GET", "POST", "PUT"]);
    }
}
