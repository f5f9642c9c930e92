//! Finding domain model
//!
//! Diagnostic plugins of every kind (security, governance, streaming, ...)
//! emit observations in the unified [`Finding`] format, which the engine
//! normalizes into deduplicated [`NormalizedFinding`] records.

pub mod entities;
pub mod value_objects;

pub use entities::{Finding, NormalizedFinding};
pub use value_objects::{
    Confidence, EvidenceKind, EvidencePointer, Precision, Severity, SourceLocation,
};
