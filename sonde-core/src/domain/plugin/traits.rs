//! Diagnostic plugin trait definitions

use async_trait::async_trait;

use crate::domain::finding::{EvidencePointer, Finding};

use super::value_objects::{DiagnosticContext, PluginError};

/// Trait that all diagnostic plugins must implement
///
/// Each plugin probes one aspect of the target server (streaming behaviour,
/// governance metadata, protocol conformance, ...) and reports its
/// observations as [`Finding`]s. Plugins are treated as untrusted: the
/// sandbox contains their crashes and enforces their budgets, so a plugin
/// implementation needs no defensive machinery of its own.
#[async_trait]
pub trait DiagnosticPlugin: Send + Sync {
    /// Stable plugin identifier, referenced by workflow nodes
    fn id(&self) -> &str;

    /// Human-readable plugin title
    fn title(&self) -> &str;

    /// Optional ordering hint used when a pipeline does not declare stages
    fn order(&self) -> Option<u32> {
        None
    }

    /// Probe the target described by `ctx` and report findings
    ///
    /// # Returns
    /// * `Ok(findings)` - observations, possibly empty
    /// * `Err(PluginError)` - the probe itself failed
    async fn run(&self, ctx: &DiagnosticContext) -> Result<Vec<Finding>, PluginError>;
}

/// Observability sink exposed to plugins through [`DiagnosticContext`]
///
/// Carries `log` and `evidence` messages out of the sandbox without affecting
/// control flow; the terminal result travels through the plugin's return
/// value instead.
pub trait EvidenceSink: Send + Sync {
    /// Forward a log line from inside a plugin
    fn log(&self, message: &str);

    /// Forward an evidence pointer discovered during probing
    fn evidence(&self, pointer: EvidencePointer);
}
