//! Workflow graph model
//!
//! The general DAG flavor: nodes carry either a plugin reference or an
//! in-process handler, edges carry optional conditions and a `required` flag
//! that gates downstream execution on upstream success. Definitions are
//! validated structurally at registration; runtime failures are the
//! executor's concern.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::{StateDelta, WorkflowState};

/// Predicate deciding whether an edge is traversable, evaluated against the
/// folded state after the source node settles.
pub type Condition = Arc<dyn Fn(&WorkflowState) -> bool + Send + Sync>;

/// In-process node body for decision and aggregation nodes. Receives a
/// snapshot of the current state and returns a partial-state delta.
pub type NodeHandler =
    Arc<dyn Fn(WorkflowState) -> BoxFuture<'static, StateDelta> + Send + Sync>;

/// What a node does when dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Runs a registered diagnostic plugin in the sandbox
    Plugin,
    /// Runs an in-process handler that inspects state and sets flags
    Decision,
    /// Runs an in-process handler that summarizes or reshapes state
    Aggregation,
}

/// One node of a workflow graph
#[derive(Clone)]
pub struct WorkflowNode {
    /// Unique node id within the definition
    pub id: String,
    /// Human-readable name for traces and logs
    pub name: String,
    pub kind: NodeKind,
    /// Plugin to dispatch; set for [`NodeKind::Plugin`] nodes only
    pub plugin_id: Option<String>,
    /// Barrier cohort key; ready nodes sharing the smallest order value are
    /// dispatched together. Unordered nodes sort after all ordered ones.
    pub order: Option<u32>,
    /// Whether this node may share a barrier group with its cohort. A
    /// non-parallel node is always dispatched alone.
    pub parallel: bool,
    /// Node body; set for decision and aggregation nodes
    pub handler: Option<NodeHandler>,
}

impl WorkflowNode {
    pub fn plugin(
        id: impl Into<String>,
        name: impl Into<String>,
        plugin_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: NodeKind::Plugin,
            plugin_id: Some(plugin_id.into()),
            order: None,
            parallel: true,
            handler: None,
        }
    }

    pub fn decision(id: impl Into<String>, name: impl Into<String>, handler: NodeHandler) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: NodeKind::Decision,
            plugin_id: None,
            order: None,
            parallel: true,
            handler: Some(handler),
        }
    }

    pub fn aggregation(
        id: impl Into<String>,
        name: impl Into<String>,
        handler: NodeHandler,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: NodeKind::Aggregation,
            plugin_id: None,
            order: None,
            parallel: true,
            handler: Some(handler),
        }
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }

    /// Mark the node as never sharing a barrier group.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Cohort sort key; unordered nodes group last.
    pub(crate) fn order_key(&self) -> u32 {
        self.order.unwrap_or(u32::MAX)
    }
}

impl std::fmt::Debug for WorkflowNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("plugin_id", &self.plugin_id)
            .field("order", &self.order)
            .field("parallel", &self.parallel)
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

/// Directed edge between two nodes
#[derive(Clone)]
pub struct WorkflowEdge {
    pub from: String,
    pub to: String,
    /// Traversal predicate; an absent condition always passes
    pub condition: Option<Condition>,
    /// When true, failure or skip of `from` permanently skips `to`
    pub required: bool,
}

impl WorkflowEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            condition: None,
            required: true,
        }
    }

    /// Downgrade the edge so upstream failure does not gate `to`.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }
}

impl std::fmt::Debug for WorkflowEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEdge")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("required", &self.required)
            .field("has_condition", &self.condition.is_some())
            .finish()
    }
}

/// Per-workflow execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub workflow_id: String,
    pub name: String,
    /// Whole-run deadline; expiry cancels in-flight groups and returns a
    /// timed-out state
    pub timeout: Duration,
    /// Persist state to the checkpoint store after each barrier group
    pub enable_checkpointing: bool,
}

impl WorkflowConfig {
    pub fn new(workflow_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            name: name.into(),
            timeout: Duration::from_secs(300),
            enable_checkpointing: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_checkpointing(mut self, enabled: bool) -> Self {
        self.enable_checkpointing = enabled;
        self
    }
}

/// Structural problems found at registration
#[derive(Debug, Error)]
pub enum GraphValidationError {
    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Entry point references unknown node: {0}")]
    UnknownEntryPoint(String),

    #[error("Edge {from} -> {to} references unknown node: {missing}")]
    UnknownNode {
        from: String,
        to: String,
        missing: String,
    },

    #[error("Plugin node {0} has no plugin id")]
    MissingPluginId(String),

    #[error("Node {0} has no handler")]
    MissingHandler(String),

    #[error("Workflow {0} contains a cycle")]
    Cycle(String),
}

/// A complete, registerable workflow graph
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    pub config: WorkflowConfig,
    /// Node execution starts from; must exist in `nodes`
    pub entry_point: String,
    pub nodes: Vec<WorkflowNode>,
    pub edges: Vec<WorkflowEdge>,
}

impl WorkflowDefinition {
    pub fn new(config: WorkflowConfig, entry_point: impl Into<String>) -> Self {
        Self {
            config,
            entry_point: entry_point.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn with_node(mut self, node: WorkflowNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_edge(mut self, edge: WorkflowEdge) -> Self {
        self.edges.push(edge);
        self
    }

    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Edges pointing into `id`.
    pub fn inbound_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a WorkflowEdge> + 'a {
        self.edges.iter().filter(move |edge| edge.to == id)
    }

    /// Node ids reachable from the entry point, ignoring edge conditions.
    /// Unreachable nodes are never scheduled and never appear in traces.
    pub fn reachable_from_entry(&self) -> HashSet<String> {
        let mut reachable = HashSet::new();
        let mut queue = VecDeque::new();
        if self.node(&self.entry_point).is_some() {
            reachable.insert(self.entry_point.clone());
            queue.push_back(self.entry_point.clone());
        }
        while let Some(current) = queue.pop_front() {
            for edge in self.edges.iter().filter(|edge| edge.from == current) {
                if reachable.insert(edge.to.clone()) {
                    queue.push_back(edge.to.clone());
                }
            }
        }
        reachable
    }

    /// Validate the definition structurally.
    ///
    /// Checks node id uniqueness, entry point existence, edge endpoint
    /// resolution, per-kind completeness (plugin id / handler), and
    /// acyclicity.
    pub fn validate(&self) -> Result<(), GraphValidationError> {
        let mut indices: HashMap<&str, NodeIndex> = HashMap::new();
        let mut graph: DiGraph<&str, ()> = DiGraph::new();

        for node in &self.nodes {
            if indices.contains_key(node.id.as_str()) {
                return Err(GraphValidationError::DuplicateNode(node.id.clone()));
            }
            indices.insert(&node.id, graph.add_node(&node.id));

            match node.kind {
                NodeKind::Plugin if node.plugin_id.is_none() => {
                    return Err(GraphValidationError::MissingPluginId(node.id.clone()));
                }
                NodeKind::Decision | NodeKind::Aggregation if node.handler.is_none() => {
                    return Err(GraphValidationError::MissingHandler(node.id.clone()));
                }
                _ => {}
            }
        }

        if !indices.contains_key(self.entry_point.as_str()) {
            return Err(GraphValidationError::UnknownEntryPoint(
                self.entry_point.clone(),
            ));
        }

        for edge in &self.edges {
            let from = indices.get(edge.from.as_str()).copied().ok_or_else(|| {
                GraphValidationError::UnknownNode {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    missing: edge.from.clone(),
                }
            })?;
            let to = indices.get(edge.to.as_str()).copied().ok_or_else(|| {
                GraphValidationError::UnknownNode {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    missing: edge.to.clone(),
                }
            })?;
            graph.add_edge(from, to, ());
        }

        if is_cyclic_directed(&graph) {
            return Err(GraphValidationError::Cycle(self.config.workflow_id.clone()));
        }

        Ok(())
    }
}
