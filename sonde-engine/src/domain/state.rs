//! Workflow run state
//!
//! The single evolving record of a run: folded findings, shared context,
//! decision flags, and the execution trace. Nodes never mutate state
//! directly; they return deltas that the executor applies deterministically
//! after each barrier group, so the state is also the checkpoint format.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sonde_core::domain::finding::{Finding, NormalizedFinding, Severity};
use sonde_core::fold;

/// Terminal (or in-flight) status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    #[serde(rename = "timeout")]
    TimedOut,
}

/// Partial state returned by a decision or aggregation handler
///
/// Only the fields a handler sets are merged; everything else in the run
/// state is untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateDelta {
    /// Context entries to insert or overwrite
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
    /// Flags to set
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
    /// Raw findings to fold into the run's normalized collection
    #[serde(default)]
    pub findings: Vec<Finding>,
}

impl StateDelta {
    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    pub fn with_flag(mut self, name: impl Into<String>, value: bool) -> Self {
        self.flags.insert(name.into(), value);
        self
    }

    pub fn with_finding(mut self, finding: Finding) -> Self {
        self.findings.push(finding);
        self
    }
}

/// Aggregate counts for a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_findings: usize,
    pub blocker: usize,
    pub major: usize,
    pub minor: usize,
    pub info: usize,
    pub nodes_completed: usize,
    pub nodes_failed: usize,
    pub nodes_skipped: usize,
}

/// Full state of one workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub run_id: Uuid,
    pub workflow_id: String,
    pub status: RunStatus,
    /// Shared key-value context visible to handlers and edge conditions
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
    /// Folded, deduplicated findings (sorted by fingerprint)
    #[serde(default)]
    pub findings: Vec<NormalizedFinding>,
    /// Human-readable trace: visited node ids plus skip/failure annotations
    #[serde(default)]
    pub execution_path: Vec<String>,
    #[serde(default)]
    pub completed_nodes: BTreeSet<String>,
    #[serde(default)]
    pub failed_nodes: BTreeSet<String>,
    #[serde(default)]
    pub skipped_nodes: BTreeSet<String>,
    /// Boolean flags set by decision handlers, read by edge conditions
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowState {
    pub fn new(run_id: Uuid, workflow_id: impl Into<String>) -> Self {
        Self {
            run_id,
            workflow_id: workflow_id.into(),
            status: RunStatus::Running,
            context: serde_json::Map::new(),
            findings: Vec::new(),
            execution_path: Vec::new(),
            completed_nodes: BTreeSet::new(),
            failed_nodes: BTreeSet::new(),
            skipped_nodes: BTreeSet::new(),
            flags: BTreeMap::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Whether the node has settled (completed, failed, or skipped).
    pub fn visited(&self, node_id: &str) -> bool {
        self.completed_nodes.contains(node_id)
            || self.failed_nodes.contains(node_id)
            || self.skipped_nodes.contains(node_id)
    }

    pub fn record_completed(&mut self, node_id: &str) {
        self.completed_nodes.insert(node_id.to_string());
        self.execution_path.push(node_id.to_string());
    }

    pub fn record_failed(&mut self, node_id: &str, reason: &str) {
        self.failed_nodes.insert(node_id.to_string());
        self.execution_path.push(format!("{node_id} failed: {reason}"));
    }

    pub fn record_skipped(&mut self, node_id: &str, reason: &str) {
        self.skipped_nodes.insert(node_id.to_string());
        self.execution_path
            .push(format!("{node_id} skipped: {reason}"));
    }

    /// Value of a decision flag; unset flags read as false.
    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    pub fn set_flag(&mut self, name: impl Into<String>, value: bool) {
        self.flags.insert(name.into(), value);
    }

    /// Whether any folded finding is at or above the given severity.
    pub fn has_severity_at_least(&self, severity: Severity) -> bool {
        self.findings.iter().any(|f| f.severity >= severity)
    }

    /// Fold raw findings into the normalized collection.
    pub fn fold_findings(&mut self, raw: &[Finding], fallback_source: &str) {
        if raw.is_empty() {
            return;
        }
        let existing = std::mem::take(&mut self.findings);
        self.findings = fold(existing, raw, fallback_source);
    }

    /// Merge a handler delta, folding any findings it carried.
    pub fn apply_delta(&mut self, delta: StateDelta, fallback_source: &str) {
        for (key, value) in delta.context {
            self.context.insert(key, value);
        }
        for (name, value) in delta.flags {
            self.flags.insert(name, value);
        }
        self.fold_findings(&delta.findings, fallback_source);
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            total_findings: self.findings.len(),
            blocker: 0,
            major: 0,
            minor: 0,
            info: 0,
            nodes_completed: self.completed_nodes.len(),
            nodes_failed: self.failed_nodes.len(),
            nodes_skipped: self.skipped_nodes.len(),
        };
        for finding in &self.findings {
            match finding.severity {
                Severity::Blocker => summary.blocker += 1,
                Severity::Major => summary.major += 1,
                Severity::Minor => summary.minor += 1,
                Severity::Info => summary.info += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> WorkflowState {
        WorkflowState::new(Uuid::new_v4(), "wf")
    }

    #[test]
    fn test_visited_covers_all_settled_sets() {
        let mut state = state();
        state.record_completed("a");
        state.record_failed("b", "boom");
        state.record_skipped("c", "unmet dependency b");

        assert!(state.visited("a"));
        assert!(state.visited("b"));
        assert!(state.visited("c"));
        assert!(!state.visited("d"));
    }

    #[test]
    fn test_skip_annotation_in_execution_path() {
        let mut state = state();
        state.record_skipped("protocol", "unmet dependency discovery");

        assert_eq!(
            state.execution_path,
            vec!["protocol skipped: unmet dependency discovery"]
        );
    }

    #[test]
    fn test_unset_flag_reads_false() {
        let state = state();
        assert!(!state.flag("has_major"));
    }

    #[test]
    fn test_apply_delta_merges_and_folds() {
        let mut state = state();
        let delta = StateDelta::default()
            .with_flag("has_major", true)
            .with_context("probe_count", serde_json::json!(3))
            .with_finding(Finding::new("f1", "streaming", Severity::Major, "slow SSE"));

        state.apply_delta(delta, "aggregator");

        assert!(state.flag("has_major"));
        assert_eq!(state.context["probe_count"], serde_json::json!(3));
        assert_eq!(state.findings.len(), 1);
        assert_eq!(state.findings[0].source, "aggregator");
    }

    #[test]
    fn test_has_severity_at_least_uses_ordering() {
        let mut state = state();
        state.fold_findings(
            &[Finding::new("f1", "governance", Severity::Major, "no rate limit")],
            "probe",
        );

        assert!(state.has_severity_at_least(Severity::Minor));
        assert!(state.has_severity_at_least(Severity::Major));
        assert!(!state.has_severity_at_least(Severity::Blocker));
    }

    #[test]
    fn test_summary_counts_by_severity() {
        let mut state = state();
        state.fold_findings(
            &[
                Finding::new("f1", "a", Severity::Major, "one"),
                Finding::new("f2", "a", Severity::Info, "two"),
                Finding::new("f3", "a", Severity::Info, "three"),
            ],
            "probe",
        );
        state.record_completed("n1");
        state.record_skipped("n2", "condition not met");

        let summary = state.summary();
        assert_eq!(summary.total_findings, 3);
        assert_eq!(summary.major, 1);
        assert_eq!(summary.info, 2);
        assert_eq!(summary.nodes_completed, 1);
        assert_eq!(summary.nodes_skipped, 1);
    }

    #[test]
    fn test_state_round_trips_through_json() {
        let mut state = state();
        state.record_completed("a");
        state.set_flag("has_major", true);
        state.status = RunStatus::TimedOut;

        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"timeout\""));
        let restored: WorkflowState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.status, RunStatus::TimedOut);
        assert!(restored.completed_nodes.contains("a"));
        assert!(restored.flag("has_major"));
    }
}
