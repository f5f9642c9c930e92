//! Sonde Core - Finding Domain Model and Normalization
//!
//! This crate provides the shared domain vocabulary for the sonde diagnostic
//! engine: the unified [`Finding`](domain::finding::Finding) format emitted by
//! diagnostic plugins, the [`DiagnosticPlugin`](domain::plugin::DiagnosticPlugin)
//! contract, and the pure normalization pipeline that collapses heterogeneous
//! raw findings into canonical, deduplicated records.
//!
//! Higher layers (the workflow engine and the plugin sandbox) depend on this
//! crate; it depends on nothing else in the workspace.

pub mod application;
pub mod config;
pub mod domain;

pub use application::normalize::{fingerprint, fold, normalize};
pub use domain::finding::{
    Confidence, EvidenceKind, EvidencePointer, Finding, NormalizedFinding, Precision, Severity,
    SourceLocation,
};
pub use domain::plugin::{DiagnosticContext, DiagnosticPlugin, EvidenceSink, PluginError};
