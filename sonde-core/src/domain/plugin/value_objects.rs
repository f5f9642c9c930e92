//! Plugin context and error value objects

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::finding::EvidencePointer;

use super::traits::EvidenceSink;

/// Context handed to a plugin for one invocation
///
/// Describes the target endpoint plus the run-scoped plumbing the sandbox
/// wires in: an observability sink for log/evidence messages and a
/// cancellation token that in-flight probes must honour (abort semantics on
/// budget or deadline expiry).
#[derive(Clone)]
pub struct DiagnosticContext {
    /// Target endpoint URL
    pub endpoint: String,
    /// Extra headers to send with probe requests
    pub headers: HashMap<String, String>,
    /// Whether the target was registered as deterministic (probes may assert
    /// on exact responses)
    pub deterministic: bool,
    /// Workflow-supplied parameters, free-form
    pub params: HashMap<String, serde_json::Value>,
    /// Observability sink; absent outside a sandbox (e.g. unit tests)
    pub sink: Option<Arc<dyn EvidenceSink>>,
    /// Cancellation signal propagated from budget/deadline enforcement
    pub cancel: CancellationToken,
}

impl DiagnosticContext {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            headers: HashMap::new(),
            deterministic: false,
            params: HashMap::new(),
            sink: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn with_deterministic(mut self, deterministic: bool) -> Self {
        self.deterministic = deterministic;
        self
    }

    /// Attach an observability sink (done by the sandbox at dispatch time).
    pub fn with_sink(mut self, sink: Arc<dyn EvidenceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Attach a cancellation token (done by the sandbox at dispatch time).
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Forward a log line to the sink, if one is attached.
    pub fn log(&self, message: &str) {
        if let Some(sink) = &self.sink {
            sink.log(message);
        }
    }

    /// Forward an evidence pointer to the sink, if one is attached.
    pub fn evidence(&self, pointer: EvidencePointer) {
        if let Some(sink) = &self.sink {
            sink.evidence(pointer);
        }
    }
}

impl std::fmt::Debug for DiagnosticContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticContext")
            .field("endpoint", &self.endpoint)
            .field("deterministic", &self.deterministic)
            .field("params", &self.params)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

/// Errors a plugin probe can fail with
#[derive(Debug, Error)]
pub enum PluginError {
    /// The probe logic itself failed
    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    /// The transport adapter reported an error
    #[error("Transport error: {0}")]
    Transport(String),

    /// The invocation was cancelled before completing
    #[error("Probe cancelled")]
    Cancelled,
}
