//! Workflow executor
//!
//! Drives registered workflow definitions to completion:
//!
//! 1. Compute the frontier: unvisited reachable nodes whose upstream edges
//!    have all settled. Nodes gated by a failed or skipped required upstream,
//!    or with any inbound condition evaluating false, are skipped with a
//!    trace annotation instead of becoming ready.
//! 2. Select one barrier group from the frontier (smallest order cohort;
//!    non-parallel nodes dispatch alone) and run its members concurrently,
//!    plugin nodes through the sandbox and handler nodes on the host
//!    runtime.
//! 3. Join the whole group, then fold outcomes into state in node-id order
//!    so concurrent completion order never changes the result. Plugin
//!    failures degrade to failure/skip records (plus a synthetic `minor`
//!    finding where nothing downstream gates on them) and the run continues.
//! 4. Checkpoint (when enabled) and repeat until the frontier is empty or
//!    the run deadline expires.
//!
//! Deadline expiry cancels in-flight work through the run's cancellation
//! token, marks the remaining frontier skipped, and resolves the run with
//! status `timeout`; it is a result, not an error.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use sonde_core::domain::finding::Finding;
use sonde_core::domain::plugin::DiagnosticContext;
use sonde_sandbox::{SandboxBudgets, SandboxError, SandboxExecutor};

use crate::domain::graph::{
    GraphValidationError, NodeKind, WorkflowDefinition, WorkflowEdge,
};
use crate::domain::pipeline::PluginWorkflow;
use crate::domain::state::{RunStatus, StateDelta, WorkflowState};
use crate::infrastructure::checkpoint::{CheckpointError, CheckpointStore};

use super::registry::PluginRegistry;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unknown workflow: {0}")]
    UnknownWorkflow(String),

    #[error("No checkpoint found for run {0}")]
    UnknownRun(Uuid),

    #[error(transparent)]
    Validation(#[from] GraphValidationError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// Per-run overrides
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Override the definition's whole-run deadline
    pub deadline: Option<Duration>,
    /// Override the engine's default sandbox budgets
    pub budgets: Option<SandboxBudgets>,
    /// Pin the run id (otherwise a fresh v4 UUID)
    pub run_id: Option<Uuid>,
}

impl RunOptions {
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_budgets(mut self, budgets: SandboxBudgets) -> Self {
        self.budgets = Some(budgets);
        self
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }
}

/// How one dispatched node settled
enum NodeOutcome {
    Findings {
        plugin_id: String,
        findings: Vec<Finding>,
    },
    PluginFailed {
        plugin_id: String,
        error: SandboxError,
    },
    Delta(StateDelta),
    HandlerFailed(String),
}

enum Disposition {
    Ready,
    Wait,
    Skip(String),
}

/// The workflow engine: definition registry plus the scheduler
pub struct WorkflowEngine {
    definitions: DashMap<String, Arc<WorkflowDefinition>>,
    registry: Arc<PluginRegistry>,
    sandbox: SandboxExecutor,
    checkpoints: Arc<dyn CheckpointStore>,
    default_budgets: SandboxBudgets,
}

impl WorkflowEngine {
    pub fn new(registry: Arc<PluginRegistry>, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        Self {
            definitions: DashMap::new(),
            registry,
            sandbox: SandboxExecutor::new(),
            checkpoints,
            default_budgets: SandboxBudgets::default(),
        }
    }

    pub fn with_default_budgets(mut self, budgets: SandboxBudgets) -> Self {
        self.default_budgets = budgets;
        self
    }

    /// Register a validated definition.
    ///
    /// Registering the same workflow id twice is a no-op; use [`Self::replace`]
    /// to swap a definition out.
    pub fn register(&self, definition: WorkflowDefinition) -> Result<String, EngineError> {
        definition.validate()?;
        let workflow_id = definition.config.workflow_id.clone();
        if self.definitions.contains_key(&workflow_id) {
            debug!(workflow_id = %workflow_id, "Workflow already registered, keeping existing definition");
            return Ok(workflow_id);
        }
        info!(
            workflow_id = %workflow_id,
            nodes = definition.nodes.len(),
            edges = definition.edges.len(),
            "Workflow registered"
        );
        self.definitions.insert(workflow_id.clone(), Arc::new(definition));
        Ok(workflow_id)
    }

    /// Compile and register a stage pipeline.
    pub fn register_pipeline(&self, pipeline: PluginWorkflow) -> Result<String, EngineError> {
        self.register(pipeline.compile())
    }

    /// Register a definition, replacing any existing one with the same id.
    /// In-flight runs keep the definition they started with.
    pub fn replace(&self, definition: WorkflowDefinition) -> Result<String, EngineError> {
        definition.validate()?;
        let workflow_id = definition.config.workflow_id.clone();
        self.definitions.insert(workflow_id.clone(), Arc::new(definition));
        Ok(workflow_id)
    }

    /// Run a workflow to completion.
    ///
    /// Always resolves with a terminal [`WorkflowState`] for a registered
    /// workflow: plugin failures, skips, and deadline expiry are recorded in
    /// the state, never raised.
    #[instrument(skip(self, ctx, options), fields(workflow_id = %workflow_id))]
    pub async fn run(
        &self,
        workflow_id: &str,
        ctx: DiagnosticContext,
        options: RunOptions,
    ) -> Result<WorkflowState, EngineError> {
        let definition = self
            .definitions
            .get(workflow_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| EngineError::UnknownWorkflow(workflow_id.to_string()))?;

        let run_id = options.run_id.unwrap_or_else(Uuid::new_v4);
        let mut state = WorkflowState::new(run_id, workflow_id);
        for (key, value) in &ctx.params {
            state.context.insert(key.clone(), value.clone());
        }

        info!(run_id = %run_id, endpoint = %ctx.endpoint, "Starting workflow run");
        self.drive(definition, ctx, state, options).await
    }

    /// Resume an interrupted run from its latest checkpoint.
    ///
    /// The frontier is recomputed from the persisted visited sets; settled
    /// nodes are not re-executed. A snapshot that is already terminal is
    /// returned as-is.
    #[instrument(skip(self, ctx, options), fields(run_id = %run_id))]
    pub async fn resume(
        &self,
        run_id: Uuid,
        ctx: DiagnosticContext,
        options: RunOptions,
    ) -> Result<WorkflowState, EngineError> {
        let state = self
            .checkpoints
            .load(run_id)
            .await?
            .ok_or(EngineError::UnknownRun(run_id))?;

        if state.status != RunStatus::Running {
            info!(status = ?state.status, "Checkpoint is already terminal, nothing to resume");
            return Ok(state);
        }

        let definition = self
            .definitions
            .get(&state.workflow_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| EngineError::UnknownWorkflow(state.workflow_id.clone()))?;

        info!(
            workflow_id = %state.workflow_id,
            completed = state.completed_nodes.len(),
            "Resuming workflow run"
        );
        self.drive(definition, ctx, state, options).await
    }

    async fn drive(
        &self,
        definition: Arc<WorkflowDefinition>,
        ctx: DiagnosticContext,
        mut state: WorkflowState,
        options: RunOptions,
    ) -> Result<WorkflowState, EngineError> {
        let budgets = options.budgets.unwrap_or_else(|| self.default_budgets.clone());
        let timeout = options.deadline.unwrap_or(definition.config.timeout);
        let deadline = tokio::time::Instant::now() + timeout;
        let cancel = ctx.cancel.child_token();

        let mut reachable: Vec<String> = definition.reachable_from_entry().into_iter().collect();
        reachable.sort();

        loop {
            let group = match self.next_group(&definition, &mut state, &reachable) {
                Some(group) => group,
                None => {
                    state.status = RunStatus::Completed;
                    break;
                }
            };
            debug!(group = ?group, "Dispatching barrier group");

            let dispatch =
                self.dispatch_group(&definition, &group, &ctx, &state, &budgets, &cancel);
            match tokio::time::timeout_at(deadline, dispatch).await {
                Ok(outcomes) => {
                    for (node_id, outcome) in outcomes {
                        fold_outcome(&definition, &mut state, &node_id, outcome);
                    }
                }
                Err(_) => {
                    warn!(timeout = ?timeout, "Run deadline expired, cancelling in-flight group");
                    cancel.cancel();
                    for node_id in &reachable {
                        if !state.visited(node_id) {
                            state.record_skipped(node_id, "workflow timeout");
                        }
                    }
                    state.status = RunStatus::TimedOut;
                    break;
                }
            }

            if definition.config.enable_checkpointing {
                if let Err(e) = self.checkpoints.save(&state).await {
                    warn!(error = %e, "Checkpoint save failed, continuing without it");
                }
            }
        }

        state.completed_at = Some(chrono::Utc::now());
        if definition.config.enable_checkpointing {
            if let Err(e) = self.checkpoints.save(&state).await {
                warn!(error = %e, "Final checkpoint save failed");
            }
        }

        let summary = state.summary();
        info!(
            run_id = %state.run_id,
            status = ?state.status,
            findings = summary.total_findings,
            completed = summary.nodes_completed,
            failed = summary.nodes_failed,
            skipped = summary.nodes_skipped,
            "Workflow run finished"
        );
        Ok(state)
    }

    /// Settle pending skips and pick the next barrier group, or `None` when
    /// no node can make progress anymore.
    fn next_group(
        &self,
        definition: &WorkflowDefinition,
        state: &mut WorkflowState,
        reachable: &[String],
    ) -> Option<Vec<String>> {
        // Skips cascade (a skipped node settles its downstream edges), so
        // classification repeats until a pass records none.
        let ready = loop {
            let mut ready = Vec::new();
            let mut skipped_any = false;

            for node_id in reachable {
                if state.visited(node_id) {
                    continue;
                }
                match classify(definition, state, reachable, node_id) {
                    Disposition::Ready => ready.push(node_id.clone()),
                    Disposition::Wait => {}
                    Disposition::Skip(reason) => {
                        debug!(node_id = %node_id, reason = %reason, "Skipping node");
                        state.record_skipped(node_id, &reason);
                        skipped_any = true;
                    }
                }
            }

            if !skipped_any {
                break ready;
            }
        };

        if ready.is_empty() {
            return None;
        }

        // Smallest-order cohort runs together; `reachable` is sorted, so the
        // cohort is already in node-id order.
        let order_of = |id: &str| {
            definition
                .node(id)
                .map(|node| node.order_key())
                .unwrap_or(u32::MAX)
        };
        let min_order = ready.iter().map(|id| order_of(id)).min()?;
        let cohort: Vec<String> = ready
            .into_iter()
            .filter(|id| order_of(id) == min_order)
            .collect();

        // A non-parallel member preempts the cohort and runs alone; the rest
        // stay ready for the next round.
        if let Some(sequential) = cohort.iter().find(|id| {
            definition
                .node(id)
                .map(|node| !node.parallel)
                .unwrap_or(false)
        }) {
            return Some(vec![sequential.clone()]);
        }

        Some(cohort)
    }

    /// Run every member of a barrier group concurrently and join them all.
    async fn dispatch_group(
        &self,
        definition: &WorkflowDefinition,
        group: &[String],
        base_ctx: &DiagnosticContext,
        state: &WorkflowState,
        budgets: &SandboxBudgets,
        cancel: &CancellationToken,
    ) -> Vec<(String, NodeOutcome)> {
        let mut dispatches = Vec::with_capacity(group.len());

        for node_id in group {
            let Some(node) = definition.node(node_id).cloned() else {
                continue;
            };

            // Folded context flows to plugins as invocation params.
            let mut node_ctx = base_ctx.clone().with_cancel(cancel.child_token());
            for (key, value) in &state.context {
                node_ctx.params.insert(key.clone(), value.clone());
            }

            let node_id = node_id.clone();
            let snapshot = state.clone();
            let sandbox = self.sandbox.clone();
            let registry = Arc::clone(&self.registry);
            let budgets = budgets.clone();

            dispatches.push(async move {
                let outcome = match node.kind {
                    NodeKind::Plugin => {
                        let plugin_id = node.plugin_id.unwrap_or_default();
                        match registry.get(&plugin_id) {
                            Some(plugin) => {
                                match sandbox.execute(plugin, node_ctx, budgets).await {
                                    Ok(findings) => NodeOutcome::Findings {
                                        plugin_id,
                                        findings,
                                    },
                                    Err(error) => NodeOutcome::PluginFailed { plugin_id, error },
                                }
                            }
                            None => {
                                let error = SandboxError::Execution(format!(
                                    "plugin {plugin_id} is not registered"
                                ));
                                NodeOutcome::PluginFailed { plugin_id, error }
                            }
                        }
                    }
                    NodeKind::Decision | NodeKind::Aggregation => match node.handler {
                        // Handlers run on the host runtime; a spawn contains
                        // their panics the way the sandbox contains plugin
                        // panics.
                        Some(handler) => match tokio::spawn(handler(snapshot)).await {
                            Ok(delta) => NodeOutcome::Delta(delta),
                            Err(e) => NodeOutcome::HandlerFailed(join_error_message(e)),
                        },
                        None => NodeOutcome::HandlerFailed("node has no handler".to_string()),
                    },
                };
                (node_id, outcome)
            });
        }

        futures::future::join_all(dispatches).await
    }
}

/// Classify one unvisited node against the current state.
fn classify(
    definition: &WorkflowDefinition,
    state: &WorkflowState,
    reachable: &[String],
    node_id: &str,
) -> Disposition {
    let inbound: Vec<&WorkflowEdge> = definition
        .inbound_edges(node_id)
        .filter(|edge| reachable.contains(&edge.from))
        .collect();

    // Only the entry node has no inbound edges from reachable sources.
    if inbound.is_empty() {
        return Disposition::Ready;
    }

    // Barrier semantics: a node observes all its upstream work or none of it.
    if inbound.iter().any(|edge| !state.visited(&edge.from)) {
        return Disposition::Wait;
    }

    if let Some(edge) = inbound
        .iter()
        .find(|edge| edge.required && !state.completed_nodes.contains(&edge.from))
    {
        return Disposition::Skip(format!("unmet dependency {}", edge.from));
    }

    // Conditions see the folded state, after upstream findings deduplicated.
    // A node is ready only when every inbound edge either carries no
    // condition or its condition holds.
    let satisfied = inbound.iter().all(|edge| {
        edge.condition
            .as_ref()
            .map(|condition| condition(state))
            .unwrap_or(true)
    });

    if satisfied {
        Disposition::Ready
    } else {
        Disposition::Skip("condition not met".to_string())
    }
}

/// Apply one settled node to the run state.
fn fold_outcome(
    definition: &WorkflowDefinition,
    state: &mut WorkflowState,
    node_id: &str,
    outcome: NodeOutcome,
) {
    match outcome {
        NodeOutcome::Findings {
            plugin_id,
            findings,
        } => {
            debug!(node_id = %node_id, findings = findings.len(), "Node completed");
            state.record_completed(node_id);
            state.fold_findings(&findings, &plugin_id);
        }
        NodeOutcome::PluginFailed { plugin_id, error } => {
            warn!(node_id = %node_id, error = %error, "Plugin node failed, degrading to partial results");
            state.record_failed(node_id, &error.to_string());
            // A timeout always leaves a synthetic finding. A throw that gates
            // required downstream work is already visible through their skip
            // entries; it folds a finding only when some downstream edge is
            // optional and would otherwise run with no signal at all.
            let has_optional_downstream = definition
                .edges
                .iter()
                .any(|edge| edge.from == node_id && !edge.required);
            match &error {
                SandboxError::Timeout(_) => {
                    state.fold_findings(&[error.to_finding(&plugin_id)], &plugin_id);
                }
                SandboxError::Execution(_) if has_optional_downstream => {
                    state.fold_findings(&[error.to_finding(&plugin_id)], &plugin_id);
                }
                SandboxError::Execution(_) => {}
            }
        }
        NodeOutcome::Delta(delta) => {
            state.record_completed(node_id);
            state.apply_delta(delta, node_id);
        }
        NodeOutcome::HandlerFailed(message) => {
            warn!(node_id = %node_id, error = %message, "Handler node failed");
            state.record_failed(node_id, &message);
        }
    }
}

fn join_error_message(e: tokio::task::JoinError) -> String {
    if e.is_panic() {
        let panic = e.into_panic();
        let message = if let Some(message) = panic.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = panic.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown panic".to_string()
        };
        format!("handler panicked: {message}")
    } else {
        "handler cancelled".to_string()
    }
}
