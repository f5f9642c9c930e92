//! Stage pipeline model
//!
//! The simpler workflow flavor for plugin-only runs: ordered stages with
//! declared dependencies, no handlers and no conditions. Pipelines are
//! compiled into the node/edge graph at registration, so the executor only
//! ever schedules one representation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::graph::{
    WorkflowConfig, WorkflowDefinition, WorkflowEdge, WorkflowNode,
};
use super::state::StateDelta;

/// Synthetic entry node inserted during compilation. Stage ids starting with
/// a double underscore are reserved.
pub const ENTRY_NODE_ID: &str = "__entry";

/// One stage of a pipeline, backed by a registered plugin
#[derive(Debug, Clone)]
pub struct PluginStage {
    pub id: String,
    pub plugin_id: String,
    /// Barrier cohort: stages sharing the smallest ready order run together
    pub order: u32,
    /// Whether the stage may share its barrier group
    pub parallel: bool,
}

impl PluginStage {
    pub fn new(id: impl Into<String>, plugin_id: impl Into<String>, order: u32) -> Self {
        Self {
            id: id.into(),
            plugin_id: plugin_id.into(),
            order,
            parallel: true,
        }
    }

    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

/// Declared dependency between two stages
#[derive(Debug, Clone)]
pub struct StageDependency {
    pub from_stage: String,
    pub to_stage: String,
    /// Context keys the downstream stage reads; informational, the executor
    /// always passes the full folded state
    pub data_flow: Vec<String>,
    /// When true, upstream failure skips the downstream stage
    pub required: bool,
}

impl StageDependency {
    pub fn new(from_stage: impl Into<String>, to_stage: impl Into<String>) -> Self {
        Self {
            from_stage: from_stage.into(),
            to_stage: to_stage.into(),
            data_flow: Vec::new(),
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_data_flow(mut self, key: impl Into<String>) -> Self {
        self.data_flow.push(key.into());
        self
    }
}

/// A plugin pipeline: stages plus dependencies
#[derive(Debug, Clone)]
pub struct PluginWorkflow {
    pub workflow_id: String,
    pub name: String,
    pub timeout: Duration,
    pub enable_checkpointing: bool,
    pub stages: Vec<PluginStage>,
    pub dependencies: Vec<StageDependency>,
}

impl PluginWorkflow {
    pub fn new(workflow_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            name: name.into(),
            timeout: Duration::from_secs(300),
            enable_checkpointing: false,
            stages: Vec::new(),
            dependencies: Vec::new(),
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

    pub fn with_stage(mut self, stage: PluginStage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn with_dependency(mut self, dependency: StageDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Compile to the node/edge graph.
    ///
    /// Each stage becomes a plugin node; a synthetic no-op entry node fans
    /// out to every stage without inbound dependencies, so the compiled graph
    /// always has a single entry point. Structural problems (duplicate stage
    /// ids, dependencies on unknown stages, cycles) are caught by
    /// [`WorkflowDefinition::validate`] at registration.
    pub fn compile(self) -> WorkflowDefinition {
        let config = WorkflowConfig::new(self.workflow_id, self.name)
            .with_timeout(self.timeout)
            .with_checkpointing(self.enable_checkpointing);

        let mut definition = WorkflowDefinition::new(config, ENTRY_NODE_ID).with_node(
            WorkflowNode::aggregation(
                ENTRY_NODE_ID,
                "pipeline entry",
                Arc::new(|_state| Box::pin(async { StateDelta::default() })),
            ),
        );

        let has_inbound: HashSet<&str> = self
            .dependencies
            .iter()
            .map(|dep| dep.to_stage.as_str())
            .collect();

        for stage in &self.stages {
            let mut node =
                WorkflowNode::plugin(&stage.id, &stage.id, &stage.plugin_id).with_order(stage.order);
            node.parallel = stage.parallel;
            definition = definition.with_node(node);

            if !has_inbound.contains(stage.id.as_str()) {
                definition = definition.with_edge(WorkflowEdge::new(ENTRY_NODE_ID, &stage.id));
            }
        }

        for dependency in &self.dependencies {
            let mut edge = WorkflowEdge::new(&dependency.from_stage, &dependency.to_stage);
            edge.required = dependency.required;
            definition = definition.with_edge(edge);
        }

        definition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::NodeKind;

    fn baseline_pipeline() -> PluginWorkflow {
        PluginWorkflow::new("diagnostic", "Baseline diagnostic")
            .with_stage(PluginStage::new("discovery", "discovery-probe", 0))
            .with_stage(PluginStage::new("protocol", "protocol-probe", 1))
            .with_stage(PluginStage::new("streaming", "streaming-probe", 2))
            .with_dependency(StageDependency::new("discovery", "protocol"))
            .with_dependency(StageDependency::new("protocol", "streaming"))
    }

    #[test]
    fn test_compile_inserts_synthetic_entry() {
        let definition = baseline_pipeline().compile();

        assert_eq!(definition.entry_point, ENTRY_NODE_ID);
        let entry = definition.node(ENTRY_NODE_ID).unwrap();
        assert_eq!(entry.kind, NodeKind::Aggregation);

        // Only the root stage hangs off the entry node.
        let fan_out: Vec<_> = definition
            .edges
            .iter()
            .filter(|edge| edge.from == ENTRY_NODE_ID)
            .map(|edge| edge.to.as_str())
            .collect();
        assert_eq!(fan_out, vec!["discovery"]);
    }

    #[test]
    fn test_compiled_pipeline_validates() {
        assert!(baseline_pipeline().compile().validate().is_ok());
    }

    #[test]
    fn test_stage_attributes_carry_over() {
        let definition = PluginWorkflow::new("wf", "wf")
            .with_stage(PluginStage::new("solo", "solo-probe", 4).sequential())
            .compile();

        let node = definition.node("solo").unwrap();
        assert_eq!(node.plugin_id.as_deref(), Some("solo-probe"));
        assert_eq!(node.order, Some(4));
        assert!(!node.parallel);
    }

    #[test]
    fn test_optional_dependency_compiles_to_optional_edge() {
        let definition = PluginWorkflow::new("wf", "wf")
            .with_stage(PluginStage::new("a", "pa", 0))
            .with_stage(PluginStage::new("b", "pb", 1))
            .with_dependency(StageDependency::new("a", "b").optional())
            .compile();

        let edge = definition
            .edges
            .iter()
            .find(|edge| edge.from == "a" && edge.to == "b")
            .unwrap();
        assert!(!edge.required);
    }

    #[test]
    fn test_cyclic_dependencies_fail_validation() {
        let definition = PluginWorkflow::new("wf", "wf")
            .with_stage(PluginStage::new("a", "pa", 0))
            .with_stage(PluginStage::new("b", "pb", 1))
            .with_dependency(StageDependency::new("a", "b"))
            .with_dependency(StageDependency::new("b", "a"))
            .compile();

        assert!(definition.validate().is_err());
    }
}
