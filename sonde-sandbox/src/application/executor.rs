//! Sandbox executor
//!
//! Provides the high-level interface for executing one diagnostic plugin
//! invocation on an isolated worker.
//!
//! # Architecture
//!
//! The executor spawns a dedicated OS thread per invocation, running its own
//! single-thread async runtime. The worker:
//!
//! 1. Receives the plugin, a context wired with an observability sink and a
//!    child cancellation token, and the resource budgets
//! 2. Drives `plugin.run()` to completion, containing panics
//! 3. Reports back over an mpsc channel using [`SandboxMessage`]
//!
//! The host side waits on the channel under the wall-clock budget and treats
//! the first `Result`/`Error` message as terminal. On budget expiry the
//! worker's cancellation token is fired so in-flight probes abort, and the
//! worker is abandoned rather than joined.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use sonde_core::domain::finding::{EvidencePointer, Finding};
use sonde_core::domain::plugin::{DiagnosticContext, DiagnosticPlugin, EvidenceSink};

use crate::domain::budgets::SandboxBudgets;
use crate::domain::messages::SandboxMessage;
use crate::domain::traits::SandboxError;

/// Executor for running diagnostic plugins in isolation
///
/// # Example
///
/// ```rust,ignore
/// use sonde_sandbox::{SandboxBudgets, SandboxExecutor};
///
/// let executor = SandboxExecutor::new();
/// let budgets = SandboxBudgets::default().with_time_ms(10_000);
/// let findings = executor.execute(plugin, ctx, budgets).await?;
/// ```
#[derive(Debug, Default, Clone)]
pub struct SandboxExecutor;

impl SandboxExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Execute a plugin invocation under the given budgets.
    ///
    /// Returns the plugin's findings, or [`SandboxError::Timeout`] /
    /// [`SandboxError::Execution`] when the budget expired or the plugin
    /// failed. Never retries.
    #[instrument(skip(self, plugin, ctx, budgets), fields(plugin_id = %plugin.id()))]
    pub async fn execute(
        &self,
        plugin: Arc<dyn DiagnosticPlugin>,
        ctx: DiagnosticContext,
        budgets: SandboxBudgets,
    ) -> Result<Vec<Finding>, SandboxError> {
        let plugin_id = plugin.id().to_string();
        info!(
            time_budget_ms = budgets.time.as_millis() as u64,
            memory_budget = budgets.max_memory,
            "Dispatching plugin to sandbox worker"
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<SandboxMessage>();

        // The worker observes a child token: budget expiry cancels the child
        // without disturbing the caller's token.
        let cancel = ctx.cancel.child_token();
        let worker_ctx = ctx
            .with_sink(Arc::new(ChannelSink { tx: tx.clone() }))
            .with_cancel(cancel.clone());

        spawn_worker(plugin, worker_ctx, tx, &plugin_id)?;

        let deadline = tokio::time::Instant::now() + budgets.time;
        loop {
            let message = match tokio::time::timeout_at(deadline, rx.recv()).await {
                Err(_) => {
                    warn!(plugin_id = %plugin_id, "Time budget exhausted, aborting worker");
                    cancel.cancel();
                    return Err(SandboxError::Timeout(budgets.time));
                }
                Ok(None) => {
                    // Worker hung up without a terminal message (should not
                    // happen; treated as a crash).
                    cancel.cancel();
                    return Err(SandboxError::Execution(
                        "worker exited without a terminal message".to_string(),
                    ));
                }
                Ok(Some(message)) => message,
            };

            match message {
                SandboxMessage::Log { message } => {
                    debug!(plugin_id = %plugin_id, "plugin: {message}");
                }
                SandboxMessage::Evidence { pointer } => {
                    debug!(plugin_id = %plugin_id, ?pointer, "plugin evidence");
                }
                SandboxMessage::Result { findings } => {
                    info!(
                        plugin_id = %plugin_id,
                        findings = findings.len(),
                        "Plugin completed"
                    );
                    return Ok(findings);
                }
                SandboxMessage::Error { message } => {
                    warn!(plugin_id = %plugin_id, error = %message, "Plugin failed");
                    return Err(SandboxError::Execution(message));
                }
            }
        }
    }
}

/// Spawn the worker thread driving one plugin invocation.
fn spawn_worker(
    plugin: Arc<dyn DiagnosticPlugin>,
    ctx: DiagnosticContext,
    tx: mpsc::UnboundedSender<SandboxMessage>,
    plugin_id: &str,
) -> Result<(), SandboxError> {
    std::thread::Builder::new()
        .name(format!("sonde-worker-{plugin_id}"))
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    let _ = tx.send(SandboxMessage::Error {
                        message: format!("failed to build worker runtime: {e}"),
                    });
                    return;
                }
            };

            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                runtime.block_on(plugin.run(&ctx))
            }));

            let terminal = match outcome {
                Ok(Ok(findings)) => SandboxMessage::Result { findings },
                Ok(Err(e)) => SandboxMessage::Error {
                    message: e.to_string(),
                },
                Err(panic) => SandboxMessage::Error {
                    message: format!("plugin panicked: {}", panic_message(&panic)),
                },
            };

            // Host may already have given up on us; nothing to do then.
            let _ = tx.send(terminal);
        })
        .map_err(|e| SandboxError::Execution(format!("failed to spawn worker thread: {e}")))?;

    Ok(())
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// [`EvidenceSink`] backed by the worker channel.
struct ChannelSink {
    tx: mpsc::UnboundedSender<SandboxMessage>,
}

impl EvidenceSink for ChannelSink {
    fn log(&self, message: &str) {
        let _ = self.tx.send(SandboxMessage::Log {
            message: message.to_string(),
        });
    }

    fn evidence(&self, pointer: EvidencePointer) {
        let _ = self.tx.send(SandboxMessage::Evidence { pointer });
    }
}
