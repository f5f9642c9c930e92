//! Sonde Sandbox - Resource-Bounded Plugin Execution
//!
//! Runs one diagnostic plugin invocation on an isolated worker so crashes and
//! runaway plugin code never take down the engine. The worker communicates
//! with the host over a small message protocol (`Log`, `Evidence`, `Result`,
//! `Error`); the first `Result` or `Error` message is terminal, anything
//! before it is observability only.
//!
//! # Budgets
//!
//! The host enforces a wall-clock time budget: if no terminal message arrives
//! in time, the invocation is abandoned, the plugin's cancellation token is
//! fired (abort semantics for in-flight probes), and the caller receives
//! [`SandboxError::Timeout`]. The memory ceiling is best-effort host
//! supervision; untrusted plugin code never enforces its own limits.
//!
//! The sandbox never retries - retry policy belongs to the transport adapters
//! a plugin calls, not to this boundary.

pub mod application;
pub mod domain;

pub use application::executor::SandboxExecutor;
pub use domain::budgets::SandboxBudgets;
pub use domain::messages::SandboxMessage;
pub use domain::traits::SandboxError;
