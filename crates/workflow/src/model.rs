//! The workflow data model: `Workflow`, `Node`, `Edge`, and settings.
//!
//! A `Workflow` is immutable for the lifetime of any execution referring to
//! it — the kernel never mutates a workflow definition after it has been
//! compiled.

use std::collections::{BTreeMap, BTreeSet};

use kestrel_core::{CredentialId, NodeId, UserId, WorkflowId};
use serde::{Deserialize, Serialize};

/// How the Graph Runner should treat a node that fails after retries are
/// exhausted for the rest of the execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// The first un-routed error terminates the execution.
    FailFast,
    /// Errors flow through `"error"` handles where present; the execution
    /// only fails if an error reaches a node with no `"error"` handle.
    Continue,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self::FailFast
    }
}

/// Workflow-wide settings that apply unless a node overrides them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    /// Default per-node timeout in milliseconds, used when a node doesn't
    /// set its own `timeout_ms`.
    pub default_timeout_ms: Option<u64>,
    /// Default number of retries for a node, used when a node doesn't set
    /// its own retry count.
    pub max_retries: u32,
    /// Partial-failure policy (see [`ErrorPolicy`]).
    pub error_policy: ErrorPolicy,
    /// Maximum sub-workflow nesting depth.
    pub max_nesting_depth: u32,
    /// When `true`, nodes unreachable from the entry set produce a fatal
    /// `OrphanError` at compile time instead of a non-fatal warning.
    pub strict_orphans: bool,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            default_timeout_ms: None,
            max_retries: 0,
            error_policy: ErrorPolicy::FailFast,
            max_nesting_depth: 10,
            strict_orphans: false,
        }
    }
}

/// A single node in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique within the owning workflow.
    pub node_id: NodeId,
    /// Tag resolved against the Node Handler Registry (e.g. `"http.request"`).
    pub type_tag: String,
    /// Opaque per-type configuration; string values may contain
    /// `{{ $input.. }}` / `{{ $vars.. }}` / `{{ $output.. }}` template refs.
    #[serde(default)]
    pub config: serde_json::Value,
    /// Credentials this node is allowed to use, by reference.
    #[serde(default)]
    pub credential_refs: BTreeSet<CredentialId>,
}

impl Node {
    /// Construct a node with empty config and no credentials.
    #[must_use]
    pub fn new(node_id: NodeId, type_tag: impl Into<String>) -> Self {
        Self {
            node_id,
            type_tag: type_tag.into(),
            config: serde_json::Value::Null,
            credential_refs: BTreeSet::new(),
        }
    }

    /// Attach a config value.
    #[must_use]
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    /// Attach a credential reference.
    #[must_use]
    pub fn with_credential(mut self, credential_id: CredentialId) -> Self {
        self.credential_refs.insert(credential_id);
        self
    }
}

/// Disambiguates which outgoing edges of a node are "taken" for a given
/// routing decision. `Default` unless a handler declares more ports.
pub const DEFAULT_HANDLE: &str = "default";

/// The structural role of an edge, used by the Graph Runner's routing and
/// by the Compiler's loop-aware cycle check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// A plain, unconditional edge.
    Default,
    /// One branch of a conditional node (`true`/`false`, `case_n`, ...).
    Conditional,
    /// The back-edge from a loop body into the loop node (re-entry).
    LoopBody,
    /// The edge taken once a loop node selects its `done` handle.
    LoopDone,
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Unique edge identifier.
    pub edge_id: kestrel_core::EdgeId,
    /// The node this edge leaves.
    pub source_node_id: NodeId,
    /// The node this edge enters.
    pub target_node_id: NodeId,
    /// Disambiguates multiple outgoing edges from the same source node.
    /// `None` means the edge fires whenever the source publishes the
    /// `"default"` output handle.
    #[serde(default)]
    pub source_handle: Option<String>,
    /// Structural role, see [`EdgeKind`].
    #[serde(default = "default_edge_kind")]
    pub kind: EdgeKind,
}

fn default_edge_kind() -> EdgeKind {
    EdgeKind::Default
}

impl Edge {
    /// Construct a default (unconditional, unlabelled) edge.
    #[must_use]
    pub fn new(source_node_id: NodeId, target_node_id: NodeId) -> Self {
        Self {
            edge_id: kestrel_core::EdgeId::v4(),
            source_node_id,
            target_node_id,
            source_handle: None,
            kind: EdgeKind::Default,
        }
    }

    /// Construct an edge with an explicit source handle and kind.
    #[must_use]
    pub fn with_handle(
        source_node_id: NodeId,
        target_node_id: NodeId,
        handle: impl Into<String>,
        kind: EdgeKind,
    ) -> Self {
        Self {
            edge_id: kestrel_core::EdgeId::v4(),
            source_node_id,
            target_node_id,
            source_handle: Some(handle.into()),
            kind,
        }
    }

    /// The effective handle this edge listens on (`"default"` when unset).
    #[must_use]
    pub fn handle(&self) -> &str {
        self.source_handle.as_deref().unwrap_or(DEFAULT_HANDLE)
    }
}

/// A field-renaming projection applied at a sub-workflow boundary.
///
/// Each entry is `dest_field -> source_path`: `source_path` is read out of
/// the source object (dot-separated for nested fields) and written under
/// `dest_field` in the projected result. An empty mapping passes its input
/// through unchanged, which is what `execute_subworkflow` uses when a
/// caller doesn't need to reshape data across the boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mapping(BTreeMap<String, String>);

impl Mapping {
    /// Construct a mapping from explicit `dest_field -> source_path` entries.
    #[must_use]
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self(entries)
    }

    /// The empty mapping: `apply` is the identity function.
    #[must_use]
    pub fn identity() -> Self {
        Self::default()
    }

    /// Project `source` through this mapping. Passes `source` through
    /// unchanged when empty; otherwise builds an object from the mapped
    /// fields, skipping any `source_path` that doesn't resolve.
    #[must_use]
    pub fn apply(&self, source: &serde_json::Value) -> serde_json::Value {
        if self.0.is_empty() {
            return source.clone();
        }
        let mut out = serde_json::Map::with_capacity(self.0.len());
        for (dest, source_path) in &self.0 {
            if let Some(value) = get_path(source, source_path) {
                out.insert(dest.clone(), value.clone());
            }
        }
        serde_json::Value::Object(out)
    }
}

fn get_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    path.split('.').try_fold(value, |v, segment| v.as_object()?.get(segment))
}

/// A workflow definition: nodes, edges, and settings. Immutable once
/// compiled — the Compiler never mutates its input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique workflow identifier.
    pub id: WorkflowId,
    /// The user who owns this workflow (used for credential scoping).
    pub owner_id: UserId,
    /// All nodes in the workflow.
    pub nodes: Vec<Node>,
    /// All edges in the workflow.
    pub edges: Vec<Edge>,
    /// Workflow-wide settings.
    #[serde(default)]
    pub settings: WorkflowSettings,
}

impl Workflow {
    /// Look up a node by ID.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.node_id == id)
    }
}

/// The runtime state of a single node within one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Not yet scheduled.
    Pending,
    /// All predecessors satisfied; eligible to run.
    Ready,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Exhausted retries (or hook aborted) without completing.
    Failed,
    /// Between retry attempts.
    Retrying,
    /// Unreachable because the branch that would have activated it was not
    /// taken.
    Skipped,
    /// Cancelled before or during execution.
    Cancelled,
}

impl NodeState {
    /// `true` once the node can no longer change state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Skipped | Self::Cancelled
        )
    }

    /// `true` while the node is actively being worked on.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Retrying)
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Retrying => "retrying",
            Self::Skipped => "skipped",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_default_handle_is_default() {
        let e = Edge::new(NodeId::v4(), NodeId::v4());
        assert_eq!(e.handle(), DEFAULT_HANDLE);
    }

    #[test]
    fn edge_with_explicit_handle() {
        let e = Edge::with_handle(NodeId::v4(), NodeId::v4(), "true", EdgeKind::Conditional);
        assert_eq!(e.handle(), "true");
        assert_eq!(e.kind, EdgeKind::Conditional);
    }

    #[test]
    fn node_state_terminal_and_active() {
        assert!(NodeState::Completed.is_terminal());
        assert!(NodeState::Skipped.is_terminal());
        assert!(!NodeState::Running.is_terminal());
        assert!(NodeState::Running.is_active());
        assert!(NodeState::Retrying.is_active());
        assert!(!NodeState::Pending.is_active());
    }

    #[test]
    fn workflow_node_lookup() {
        let n = Node::new(NodeId::v4(), "http.request");
        let wf = Workflow {
            id: WorkflowId::v4(),
            owner_id: UserId::v4(),
            nodes: vec![n.clone()],
            edges: vec![],
            settings: WorkflowSettings::default(),
        };
        assert!(wf.node(n.node_id).is_some());
        assert!(wf.node(NodeId::v4()).is_none());
    }

    #[test]
    fn settings_default_error_policy_is_fail_fast() {
        assert_eq!(WorkflowSettings::default().error_policy, ErrorPolicy::FailFast);
    }

    #[test]
    fn error_policy_serde_snake_case() {
        let json = serde_json::to_string(&ErrorPolicy::FailFast).unwrap();
        assert_eq!(json, "\"fail_fast\"");
    }

    #[test]
    fn mapping_identity_passes_value_through() {
        let source = serde_json::json!({"status": "ok", "id": 1});
        assert_eq!(Mapping::identity().apply(&source), source);
    }

    #[test]
    fn mapping_extracts_and_renames_fields() {
        let mut entries = BTreeMap::new();
        entries.insert("verification_result".to_string(), "status".to_string());
        let mapping = Mapping::new(entries);
        let source = serde_json::json!({"status": "verified", "id": 1});
        assert_eq!(mapping.apply(&source), serde_json::json!({"verification_result": "verified"}));
    }

    #[test]
    fn mapping_follows_dotted_paths() {
        let mut entries = BTreeMap::new();
        entries.insert("user_id".to_string(), "user.id".to_string());
        let mapping = Mapping::new(entries);
        let source = serde_json::json!({"user": {"id": 1500}});
        assert_eq!(mapping.apply(&source), serde_json::json!({"user_id": 1500}));
    }

    #[test]
    fn mapping_skips_unresolved_source_paths() {
        let mut entries = BTreeMap::new();
        entries.insert("missing".to_string(), "nope".to_string());
        let mapping = Mapping::new(entries);
        assert_eq!(mapping.apply(&serde_json::json!({"status": "ok"})), serde_json::json!({}));
    }

    #[test]
    fn node_with_config_and_credential_builders() {
        let cred = CredentialId::v4();
        let n = Node::new(NodeId::v4(), "http.request")
            .with_config(serde_json::json!({"url": "https://example.com"}))
            .with_credential(cred);
        assert_eq!(n.config, serde_json::json!({"url": "https://example.com"}));
        assert!(n.credential_refs.contains(&cred));
    }
}
