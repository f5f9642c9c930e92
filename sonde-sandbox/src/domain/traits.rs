//! Sandbox error types

use std::time::Duration;

use thiserror::Error;

use sonde_core::domain::finding::{Finding, Severity};

/// Errors that can occur during sandboxed plugin execution
#[derive(Debug, Error)]
pub enum SandboxError {
    /// No terminal message arrived within the time budget
    #[error("Plugin execution timed out after {0:?}")]
    Timeout(Duration),

    /// The plugin failed or the worker crashed
    #[error("Plugin execution failed: {0}")]
    Execution(String),
}

impl SandboxError {
    /// Convert this failure into the single synthetic finding the engine
    /// folds into workflow state (severity `minor`; a plugin failure never
    /// aborts the run).
    pub fn to_finding(&self, plugin_id: &str) -> Finding {
        match self {
            Self::Timeout(budget) => Finding::new(
                format!("{plugin_id}-sandbox-timeout"),
                "engine",
                Severity::Minor,
                "plugin timed out",
            )
            .with_description(format!(
                "Plugin '{plugin_id}' produced no terminal result within {budget:?} and was terminated"
            ))
            .with_source(plugin_id)
            .with_tag("sandbox"),
            Self::Execution(message) => Finding::new(
                format!("{plugin_id}-sandbox-failure"),
                "engine",
                Severity::Minor,
                "plugin failed",
            )
            .with_description(format!("Plugin '{plugin_id}' failed: {message}"))
            .with_source(plugin_id)
            .with_tag("sandbox"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_becomes_minor_finding() {
        let finding = SandboxError::Timeout(Duration::from_secs(5)).to_finding("sse-probe");
        assert_eq!(finding.severity, Severity::Minor);
        assert_eq!(finding.title, "plugin timed out");
        assert_eq!(finding.source.as_deref(), Some("sse-probe"));
    }

    #[test]
    fn test_execution_failure_carries_message() {
        let finding = SandboxError::Execution("connection refused".into()).to_finding("p");
        assert_eq!(finding.title, "plugin failed");
        assert!(finding.description.contains("connection refused"));
    }
}
