//! The validation pipeline: `compile(workflow, registry, credentials)`.

use std::collections::{BTreeSet, HashMap, HashSet};

use kestrel_core::constants::{SYSTEM_DEFAULT_TIMEOUT, SYSTEM_MAX_LOOPS};
use kestrel_node::{FieldType, NodeRegistry};
use kestrel_workflow::{DependencyGraph, Workflow, DEFAULT_HANDLE};

use crate::credential::AvailableCredential;
use crate::error::{CompilationError, CompilationWarning};
use crate::plan::{BoundNode, ExecutionPlan};

/// Successful output of [`compile`]: the plan plus any non-fatal warnings.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// The validated, handler-bound plan.
    pub plan: ExecutionPlan,
    /// Non-fatal issues surfaced during compilation.
    pub warnings: Vec<CompilationWarning>,
}

/// Compile a workflow definition and the invoking user's available
/// credentials into an executable plan.
///
/// Runs the validation pipeline fail-fast, in this order: structural ->
/// cycle legality -> orphans -> credential binding -> config shape -> soft
/// type compatibility -> topological ordering.
pub fn compile(
    workflow: &Workflow,
    registry: &NodeRegistry,
    available_credentials: &[AvailableCredential],
) -> Result<CompileOutput, CompilationError> {
    // 1. Structural: graph construction already rejects duplicate ids,
    // dangling edges, and the empty workflow.
    let graph = DependencyGraph::from_workflow(workflow)?;

    for node in &workflow.nodes {
        if !registry.contains(&node.type_tag) {
            return Err(CompilationError::UnknownNodeType {
                node_id: node.node_id,
                type_tag: node.type_tag.clone(),
            });
        }
    }

    // 2. Cycles with loop-awareness.
    let sccs = graph.nontrivial_sccs();
    let mut loop_carrying_node_ids = BTreeSet::new();
    for scc in &sccs {
        let has_loop_carrier = scc.iter().any(|node_id| {
            workflow
                .node(*node_id)
                .and_then(|n| registry.get(&n.type_tag))
                .is_some_and(|h| h.metadata().is_loop_carrying)
        });
        if !has_loop_carrier {
            return Err(CompilationError::CycleError { node_ids: scc.clone() });
        }
        loop_carrying_node_ids.extend(scc.iter().copied());
    }

    // 3. Orphans. A loop-carrying SCC with no predecessor outside itself has
    // no raw zero-incoming-edge node (its only incoming edge is its own
    // back-edge) and so is invisible to `graph.entry_nodes()`; its
    // loop-declaring node is added as an entry point so the Graph Runner has
    // somewhere to start such a self-contained loop.
    let mut entry_nodes = graph.entry_nodes();
    for scc in &sccs {
        let scc_set: HashSet<kestrel_core::NodeId> = scc.iter().copied().collect();
        let has_external_predecessor = scc
            .iter()
            .any(|&id| graph.predecessors(id).into_iter().any(|p| !scc_set.contains(&p)));
        if has_external_predecessor {
            continue;
        }
        let loop_head = scc.iter().find(|&&id| {
            workflow
                .node(id)
                .and_then(|n| registry.get(&n.type_tag))
                .is_some_and(|h| h.metadata().is_loop_carrying)
        });
        if let Some(&head) = loop_head {
            if !entry_nodes.contains(&head) {
                entry_nodes.push(head);
            }
        }
    }
    entry_nodes.sort_by_key(ToString::to_string);
    let reachable = graph.reachable_from(&entry_nodes);
    let all_ids: HashSet<_> = graph.node_ids().into_iter().collect();
    let mut orphans: Vec<_> = all_ids.difference(&reachable).copied().collect();
    orphans.sort_by_key(ToString::to_string);
    let mut warnings = Vec::new();
    if !orphans.is_empty() {
        if workflow.settings.strict_orphans {
            return Err(CompilationError::OrphanError { node_ids: orphans });
        }
        warnings.push(CompilationWarning::OrphanNodes(orphans));
    }

    // 4. Credential binding.
    let credentials_by_id: HashMap<_, _> = available_credentials
        .iter()
        .map(|c| (c.id, c.credential_type.as_str()))
        .collect();
    for node in &workflow.nodes {
        let handler = registry.get(&node.type_tag).expect("checked above");
        for credential_ref in &node.credential_refs {
            let Some(credential_type) = credentials_by_id.get(credential_ref) else {
                return Err(CompilationError::CredentialError {
                    node_id: node.node_id,
                    reason: format!("credential {credential_ref} not owned by this user"),
                });
            };
            if !handler.metadata().declared_credentials.iter().any(|t| t == credential_type) {
                return Err(CompilationError::CredentialError {
                    node_id: node.node_id,
                    reason: format!(
                        "credential type {credential_type} not among this node type's declared credentials"
                    ),
                });
            }
        }
    }

    // 5. Config shape.
    for node in &workflow.nodes {
        let handler = registry.get(&node.type_tag).expect("checked above");
        let config_obj = node.config.as_object();
        for field in &handler.metadata().declared_fields {
            let value = config_obj.and_then(|obj| obj.get(&field.name));
            match value {
                None if field.required => {
                    return Err(CompilationError::ConfigError {
                        node_id: node.node_id,
                        field: field.name.clone(),
                        reason: "missing required field".into(),
                    });
                }
                None => {}
                Some(v) => validate_field_type(node.node_id, field, v)?,
            }
        }
    }

    // 6. Type compatibility (soft). Node metadata in this kernel declares
    // output *handles*, not value schemas, so there is nothing concrete
    // enough on either side to compare; this stage is a deliberate no-op.

    // 7. Topological ordering over the loop-condensed DAG.
    let topological_order = graph.topological_order(&sccs)?;
    let exit_nodes = graph.exit_nodes();

    let mut adjacency: HashMap<(kestrel_core::NodeId, String), Vec<kestrel_core::NodeId>> = HashMap::new();
    for edge in &workflow.edges {
        let handle = edge.handle().to_owned();
        adjacency
            .entry((edge.source_node_id, handle))
            .or_default()
            .push(edge.target_node_id);
    }

    let mut nodes = HashMap::new();
    for node in &workflow.nodes {
        let handler = registry.get(&node.type_tag).expect("checked above").clone();
        let effective_timeout_ms = node
            .config
            .as_object()
            .and_then(|o| o.get("timeout_ms"))
            .and_then(serde_json::Value::as_u64)
            .or(workflow.settings.default_timeout_ms)
            .unwrap_or(SYSTEM_DEFAULT_TIMEOUT.as_millis() as u64);
        let effective_max_retries = node
            .config
            .as_object()
            .and_then(|o| o.get("max_retries"))
            .and_then(serde_json::Value::as_u64)
            .map(|v| v as u32)
            .unwrap_or(workflow.settings.max_retries);
        let max_loop_count = node
            .config
            .as_object()
            .and_then(|o| o.get("max_loop_count"))
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(SYSTEM_MAX_LOOPS);

        nodes.insert(
            node.node_id,
            BoundNode {
                node_id: node.node_id,
                handler,
                effective_timeout_ms,
                effective_max_retries,
                max_loop_count,
                is_loop_carrying: loop_carrying_node_ids.contains(&node.node_id),
            },
        );
    }

    let plan = ExecutionPlan::new(
        workflow.id,
        topological_order,
        entry_nodes,
        exit_nodes,
        adjacency,
        nodes,
        loop_carrying_node_ids,
    );

    Ok(CompileOutput { plan, warnings })
}

fn validate_field_type(
    node_id: kestrel_core::NodeId,
    field: &kestrel_node::FieldSchema,
    value: &serde_json::Value,
) -> Result<(), CompilationError> {
    let ok = match field.field_type {
        FieldType::String | FieldType::SecretRef | FieldType::CodeString => value.is_string(),
        FieldType::Number => value.is_number(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::Select => value
            .as_str()
            .is_some_and(|s| field.options.iter().any(|o| o == s)),
    };
    if ok {
        Ok(())
    } else {
        Err(CompilationError::ConfigError {
            node_id,
            field: field.name.clone(),
            reason: format!("value does not match declared type {:?}", field.field_type),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kestrel_core::{CredentialId, NodeId, UserId, WorkflowId};
    use kestrel_node::{FieldSchema, HandlerError, NodeContext, NodeHandler, NodeMetadata, NodeResult};
    use kestrel_workflow::{Edge, EdgeKind, Node, Workflow, WorkflowSettings};
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct Echo {
        meta: NodeMetadata,
    }

    #[async_trait]
    impl NodeHandler for Echo {
        async fn execute(&self, input: Value, _config: Value, _ctx: NodeContext) -> Result<NodeResult, HandlerError> {
            Ok(NodeResult::default_handle(input.as_object().cloned().unwrap_or_default()))
        }

        fn metadata(&self) -> &NodeMetadata {
            &self.meta
        }
    }

    fn registry() -> NodeRegistry {
        let mut reg = NodeRegistry::new();
        reg.register(Arc::new(Echo {
            meta: NodeMetadata::new("echo", "Echo", "Echoes input")
                .with_field(FieldSchema::required("message", FieldType::String)),
        }));
        reg.register(Arc::new(Echo {
            meta: NodeMetadata::new("loop", "Loop", "Iterates").loop_carrying(),
        }));
        reg
    }

    fn node(id: NodeId, type_tag: &str, config: Value) -> Node {
        Node::new(id, type_tag).with_config(config)
    }

    fn workflow(nodes: Vec<Node>, edges: Vec<Edge>) -> Workflow {
        Workflow {
            id: WorkflowId::v4(),
            owner_id: UserId::v4(),
            nodes,
            edges,
            settings: WorkflowSettings::default(),
        }
    }

    #[test]
    fn compiles_linear_workflow() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let wf = workflow(
            vec![
                node(a, "echo", json!({"message": "hi"})),
                node(b, "echo", json!({"message": "bye"})),
            ],
            vec![Edge::new(a, b)],
        );
        let out = compile(&wf, &registry(), &[]).unwrap();
        assert_eq!(out.plan.total_nodes(), 2);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn rejects_unknown_node_type() {
        let a = NodeId::v4();
        let wf = workflow(vec![node(a, "nonexistent", json!({}))], vec![]);
        let err = compile(&wf, &registry(), &[]).unwrap_err();
        assert!(matches!(err, CompilationError::UnknownNodeType { .. }));
    }

    #[test]
    fn rejects_illegal_cycle() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let wf = workflow(
            vec![
                node(a, "echo", json!({"message": "x"})),
                node(b, "echo", json!({"message": "y"})),
            ],
            vec![
                Edge::new(a, b),
                Edge::new(b, a),
            ],
        );
        let err = compile(&wf, &registry(), &[]).unwrap_err();
        assert!(matches!(err, CompilationError::CycleError { .. }));
    }

    #[test]
    fn allows_cycle_with_loop_carrying_node() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let wf = workflow(
            vec![node(a, "loop", json!({})), node(b, "echo", json!({"message": "y"}))],
            vec![
                Edge::with_handle(a, b, "loop", EdgeKind::LoopBody),
                Edge::new(b, a),
            ],
        );
        let out = compile(&wf, &registry(), &[]).unwrap();
        assert!(out.plan.loop_carrying_node_ids.contains(&a));
        assert!(out.plan.loop_carrying_node_ids.contains(&b));
    }

    #[test]
    fn orphans_produce_warning_by_default() {
        let a = NodeId::v4();
        let orphan = NodeId::v4();
        let wf = workflow(
            vec![node(a, "echo", json!({"message": "x"})), node(orphan, "echo", json!({"message": "y"}))],
            vec![],
        );
        let out = compile(&wf, &registry(), &[]).unwrap();
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn orphans_fatal_in_strict_mode() {
        let a = NodeId::v4();
        let orphan = NodeId::v4();
        let mut wf = workflow(
            vec![node(a, "echo", json!({"message": "x"})), node(orphan, "echo", json!({"message": "y"}))],
            vec![],
        );
        wf.settings.strict_orphans = true;
        let err = compile(&wf, &registry(), &[]).unwrap_err();
        assert!(matches!(err, CompilationError::OrphanError { .. }));
    }

    #[test]
    fn rejects_config_missing_required_field() {
        let a = NodeId::v4();
        let wf = workflow(vec![node(a, "echo", json!({}))], vec![]);
        let err = compile(&wf, &registry(), &[]).unwrap_err();
        assert!(matches!(err, CompilationError::ConfigError { .. }));
    }

    #[test]
    fn rejects_config_wrong_type() {
        let a = NodeId::v4();
        let wf = workflow(vec![node(a, "echo", json!({"message": 5}))], vec![]);
        let err = compile(&wf, &registry(), &[]).unwrap_err();
        assert!(matches!(err, CompilationError::ConfigError { .. }));
    }

    #[test]
    fn rejects_unbound_credential() {
        let a = NodeId::v4();
        let mut n = node(a, "echo", json!({"message": "hi"}));
        n.credential_refs.insert(CredentialId::v4());
        let wf = workflow(vec![n], vec![]);
        let err = compile(&wf, &registry(), &[]).unwrap_err();
        assert!(matches!(err, CompilationError::CredentialError { .. }));
    }

    #[test]
    fn accepts_declared_credential() {
        let mut reg = NodeRegistry::new();
        reg.register(Arc::new(Echo {
            meta: NodeMetadata::new("needs_cred", "Needs Cred", "x").with_credential("http_bearer"),
        }));
        let a = NodeId::v4();
        let cred_id = CredentialId::v4();
        let mut n = node(a, "needs_cred", json!({}));
        n.credential_refs.insert(cred_id);
        let wf = workflow(vec![n], vec![]);
        let creds = vec![AvailableCredential::new(cred_id, "http_bearer")];
        let out = compile(&wf, &reg, &creds).unwrap();
        assert_eq!(out.plan.total_nodes(), 1);
    }

    #[test]
    fn effective_timeout_falls_back_through_levels() {
        let a = NodeId::v4();
        let wf = workflow(vec![node(a, "echo", json!({"message": "hi"}))], vec![]);
        let out = compile(&wf, &registry(), &[]).unwrap();
        assert_eq!(out.plan.node(a).unwrap().effective_timeout_ms, SYSTEM_DEFAULT_TIMEOUT.as_millis() as u64);
    }

    #[test]
    fn node_level_timeout_overrides_default() {
        let a = NodeId::v4();
        let wf = workflow(vec![node(a, "echo", json!({"message": "hi", "timeout_ms": 1234}))], vec![]);
        let out = compile(&wf, &registry(), &[]).unwrap();
        assert_eq!(out.plan.node(a).unwrap().effective_timeout_ms, 1234);
    }

    #[test]
    fn max_loop_count_falls_back_to_system_default() {
        let a = NodeId::v4();
        let wf = workflow(vec![node(a, "loop", json!({}))], vec![]);
        let out = compile(&wf, &registry(), &[]).unwrap();
        assert_eq!(out.plan.node(a).unwrap().max_loop_count, SYSTEM_MAX_LOOPS);
    }

    #[test]
    fn node_level_max_loop_count_overrides_default() {
        let a = NodeId::v4();
        let wf = workflow(vec![node(a, "loop", json!({"max_loop_count": 3}))], vec![]);
        let out = compile(&wf, &registry(), &[]).unwrap();
        assert_eq!(out.plan.node(a).unwrap().max_loop_count, 3);
    }

    #[test]
    fn self_contained_loop_head_is_an_entry_node() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let wf = workflow(
            vec![node(a, "loop", json!({})), node(b, "echo", json!({"message": "y"}))],
            vec![
                Edge::with_handle(a, b, "loop", EdgeKind::LoopBody),
                Edge::new(b, a),
            ],
        );
        let out = compile(&wf, &registry(), &[]).unwrap();
        assert!(out.plan.entry_nodes.contains(&a));
    }

    #[test]
    fn externally_triggered_loop_is_not_added_as_extra_entry() {
        let t = NodeId::v4();
        let a = NodeId::v4();
        let b = NodeId::v4();
        let wf = workflow(
            vec![
                node(t, "echo", json!({"message": "start"})),
                node(a, "loop", json!({})),
                node(b, "echo", json!({"message": "y"})),
            ],
            vec![
                Edge::new(t, a),
                Edge::with_handle(a, b, "loop", EdgeKind::LoopBody),
                Edge::new(b, a),
            ],
        );
        let out = compile(&wf, &registry(), &[]).unwrap();
        assert_eq!(out.plan.entry_nodes, vec![t]);
    }

    #[test]
    fn adjacency_respects_output_handle() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let c = NodeId::v4();
        let wf = workflow(
            vec![
                node(a, "echo", json!({"message": "x"})),
                node(b, "echo", json!({"message": "y"})),
                node(c, "echo", json!({"message": "z"})),
            ],
            vec![
                Edge::with_handle(a, b, "true", EdgeKind::Conditional),
                Edge::with_handle(a, c, "false", EdgeKind::Conditional),
            ],
        );
        let out = compile(&wf, &registry(), &[]).unwrap();
        assert_eq!(out.plan.next_nodes(a, "true"), &[b]);
        assert_eq!(out.plan.next_nodes(a, "false"), &[c]);
    }
}
