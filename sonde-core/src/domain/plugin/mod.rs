//! Diagnostic plugin contract
//!
//! Plugins are thin probes against a remote protocol endpoint. The engine
//! only requires that [`DiagnosticPlugin::run`] resolves to a list of
//! findings or fails; the transport adapters a plugin uses to talk to the
//! target (HTTP, JSON-RPC, SSE, WebSocket) are external collaborators.

pub mod traits;
pub mod value_objects;

pub use traits::{DiagnosticPlugin, EvidenceSink};
pub use value_objects::{DiagnosticContext, PluginError};
