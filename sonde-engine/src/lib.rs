//! Sonde Engine - Workflow Graph Execution
//!
//! The orchestration core of sonde: runs diagnostic plugins against a target
//! endpoint as a dependency graph with conditional branching and barrier
//! parallelism, dispatching plugin nodes through the sandbox and folding raw
//! findings into deduplicated workflow state after every barrier group.
//!
//! Two DAG flavors share the one scheduler: the general node/edge graph with
//! handler-based decisions ([`domain::graph::WorkflowDefinition`]) and the
//! simpler stage pipeline ([`domain::pipeline::PluginWorkflow`]), which is
//! compiled into the node/edge model at registration time.
//!
//! Runtime plugin failures never abort a run; the engine degrades to partial
//! results and a readable execution trace. Only structural misconfiguration
//! (unknown workflow, cyclic graph) is reported as an error.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::executor::{EngineError, RunOptions, WorkflowEngine};
pub use application::registry::PluginRegistry;
pub use domain::graph::{
    Condition, GraphValidationError, NodeHandler, NodeKind, WorkflowConfig, WorkflowDefinition,
    WorkflowEdge, WorkflowNode,
};
pub use domain::pipeline::{PluginStage, PluginWorkflow, StageDependency};
pub use domain::state::{RunStatus, RunSummary, StateDelta, WorkflowState};
pub use infrastructure::checkpoint::{
    CheckpointError, CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore,
};
