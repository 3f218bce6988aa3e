//! `DependencyGraph`: the structural view of a [`Workflow`] used by the
//! Compiler and Graph Runner.
//!
//! This crate only knows about edges and handles — it has no notion of
//! which node types "carry" a loop. The loop-legality check (a
//! strongly-connected component is only legal if it contains at least one
//! loop-carrying node) lives in `kestrel-compiler`, which calls
//! [`DependencyGraph::sccs`] and makes that call itself.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use kestrel_core::NodeId;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::error::WorkflowError;
use crate::model::Workflow;

/// The structural graph of a workflow: nodes plus `(source, handle) -> targets`
/// adjacency, backed by a `petgraph::DiGraph` for algorithmic work.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<NodeId, Option<String>>,
    index_of: HashMap<NodeId, NodeIndex>,
}

impl DependencyGraph {
    /// Build a graph from a workflow definition.
    ///
    /// # Errors
    /// Returns [`WorkflowError::DuplicateNodeId`] if two nodes share an id,
    /// [`WorkflowError::DanglingEdge`] if an edge references a missing node,
    /// or [`WorkflowError::EmptyWorkflow`] if there are no nodes.
    pub fn from_workflow(workflow: &Workflow) -> Result<Self, WorkflowError> {
        if workflow.nodes.is_empty() {
            return Err(WorkflowError::EmptyWorkflow);
        }

        let mut graph = DiGraph::new();
        let mut index_of = HashMap::with_capacity(workflow.nodes.len());

        for node in &workflow.nodes {
            if index_of.contains_key(&node.node_id) {
                return Err(WorkflowError::DuplicateNodeId(node.node_id));
            }
            let idx = graph.add_node(node.node_id);
            index_of.insert(node.node_id, idx);
        }

        for edge in &workflow.edges {
            let source = *index_of
                .get(&edge.source_node_id)
                .ok_or(WorkflowError::DanglingEdge {
                    edge_id: edge.edge_id,
                    node_id: edge.source_node_id,
                })?;
            let target = *index_of
                .get(&edge.target_node_id)
                .ok_or(WorkflowError::DanglingEdge {
                    edge_id: edge.edge_id,
                    node_id: edge.target_node_id,
                })?;
            graph.add_edge(source, target, edge.source_handle.clone());
        }

        Ok(Self { graph, index_of })
    }

    /// All node ids, in insertion order.
    #[must_use]
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.graph.node_weights().copied().collect()
    }

    /// Nodes with no incoming edges.
    #[must_use]
    pub fn entry_nodes(&self) -> Vec<NodeId> {
        let mut v: Vec<NodeId> = self
            .index_of
            .iter()
            .filter(|(_, idx)| {
                self.graph
                    .neighbors_directed(**idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|(id, _)| *id)
            .collect();
        v.sort_by_key(|id| id.to_string());
        v
    }

    /// Nodes with no outgoing edges.
    #[must_use]
    pub fn exit_nodes(&self) -> Vec<NodeId> {
        let mut v: Vec<NodeId> = self
            .index_of
            .iter()
            .filter(|(_, idx)| {
                self.graph
                    .neighbors_directed(**idx, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .map(|(id, _)| *id)
            .collect();
        v.sort_by_key(|id| id.to_string());
        v
    }

    /// Direct predecessors of a node, in no particular order.
    #[must_use]
    pub fn predecessors(&self, node_id: NodeId) -> Vec<NodeId> {
        let Some(&idx) = self.index_of.get(&node_id) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|i| self.graph[i])
            .collect()
    }

    /// Direct successors reachable via edges whose handle equals `handle`
    /// (an edge with no `source_handle` matches `"default"`).
    #[must_use]
    pub fn successors_by_handle(&self, node_id: NodeId, handle: &str) -> Vec<NodeId> {
        let Some(&idx) = self.index_of.get(&node_id) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| e.weight().as_deref().unwrap_or(crate::model::DEFAULT_HANDLE) == handle)
            .map(|e| self.graph[e.target()])
            .collect()
    }

    /// All direct successors, regardless of handle.
    #[must_use]
    pub fn successors(&self, node_id: NodeId) -> Vec<NodeId> {
        let Some(&idx) = self.index_of.get(&node_id) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|i| self.graph[i])
            .collect()
    }

    /// Strongly-connected components with more than one node — candidate
    /// cycles the compiler must classify as legal (loop-carrying) or
    /// illegal.
    #[must_use]
    pub fn nontrivial_sccs(&self) -> Vec<Vec<NodeId>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1
                    || scc
                        .first()
                        .is_some_and(|&idx| self.graph.find_edge(idx, idx).is_some())
            })
            .map(|scc| scc.into_iter().map(|idx| self.graph[idx]).collect())
            .collect()
    }

    /// Topological order over the graph after collapsing each given group of
    /// nodes (a legal loop SCC) into a single unit. Ties among
    /// simultaneously-ready nodes break by ascending `node_id` string
    /// representation for determinism.
    ///
    /// `condensed_groups` must be pairwise disjoint; nodes not mentioned in
    /// any group are their own singleton unit.
    ///
    /// # Errors
    /// Returns [`WorkflowError::UnresolvedCycle`] if, after condensation,
    /// the remaining graph still contains a cycle (i.e. a group boundary
    /// was drawn incorrectly upstream).
    pub fn topological_order(
        &self,
        condensed_groups: &[Vec<NodeId>],
    ) -> Result<Vec<NodeId>, WorkflowError> {
        let mut unit_of: HashMap<NodeId, usize> = HashMap::new();
        let mut units: Vec<Vec<NodeId>> = Vec::new();

        for group in condensed_groups {
            let unit_idx = units.len();
            for &id in group {
                unit_of.insert(id, unit_idx);
            }
            units.push(group.clone());
        }
        for id in self.node_ids() {
            if let std::collections::hash_map::Entry::Vacant(e) = unit_of.entry(id) {
                let unit_idx = units.len();
                e.insert(unit_idx);
                units.push(vec![id]);
            }
        }

        let unit_count = units.len();
        let mut in_degree = vec![0usize; unit_count];
        let mut adjacency: Vec<HashSet<usize>> = vec![HashSet::new(); unit_count];

        for edge in self.graph.edge_indices() {
            let (src, dst) = self.graph.edge_endpoints(edge).expect("edge exists");
            let src_unit = unit_of[&self.graph[src]];
            let dst_unit = unit_of[&self.graph[dst]];
            if src_unit == dst_unit {
                continue;
            }
            if adjacency[src_unit].insert(dst_unit) {
                in_degree[dst_unit] += 1;
            }
        }

        let mut ready: BTreeMap<String, usize> = BTreeMap::new();
        for (unit_idx, degree) in in_degree.iter().enumerate() {
            if *degree == 0 {
                ready.insert(sort_key(&units[unit_idx]), unit_idx);
            }
        }

        let mut order = Vec::with_capacity(self.node_ids().len());
        let mut visited_units = 0usize;

        while let Some((_, unit_idx)) = pop_min(&mut ready) {
            visited_units += 1;
            let mut group = units[unit_idx].clone();
            group.sort_by_key(ToString::to_string);
            order.extend(group);

            for &next_unit in &adjacency[unit_idx] {
                in_degree[next_unit] -= 1;
                if in_degree[next_unit] == 0 {
                    ready.insert(sort_key(&units[next_unit]), next_unit);
                }
            }
        }

        if visited_units != unit_count {
            let stuck = units
                .iter()
                .enumerate()
                .find(|(idx, _)| in_degree[*idx] > 0)
                .and_then(|(_, group)| group.first().copied())
                .unwrap_or_else(NodeId::nil);
            return Err(WorkflowError::UnresolvedCycle(stuck));
        }

        Ok(order)
    }

    /// Breadth-first set of node ids reachable from `starts` following any
    /// outgoing edge. Used by the compiler's orphan-node check.
    #[must_use]
    pub fn reachable_from(&self, starts: &[NodeId]) -> HashSet<NodeId> {
        let mut seen: HashSet<NodeId> = starts.iter().copied().collect();
        let mut queue: VecDeque<NodeId> = starts.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            for succ in self.successors(id) {
                if seen.insert(succ) {
                    queue.push_back(succ);
                }
            }
        }
        seen
    }
}

fn sort_key(group: &[NodeId]) -> String {
    group
        .iter()
        .map(ToString::to_string)
        .min()
        .unwrap_or_default()
}

fn pop_min(map: &mut BTreeMap<String, usize>) -> Option<(String, usize)> {
    let key = map.keys().next()?.clone();
    map.remove_entry(&key)
}
