//! Finding value objects

use serde::{Deserialize, Serialize};

/// Finding severity
///
/// Variants are declared in ascending order so the derived `Ord` ranks
/// `Blocker` highest, which the normalizer relies on when merging duplicate
/// findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational observation
    Info,
    /// Minor issue, cosmetic or degraded behaviour
    Minor,
    /// Major issue, functionality is impaired
    Major,
    /// Blocking issue, the server is unusable or unsafe
    #[serde(alias = "critical")]
    Blocker,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Minor => write!(f, "minor"),
            Self::Major => write!(f, "major"),
            Self::Blocker => write!(f, "blocker"),
        }
    }
}

/// Confidence level reported by a plugin for a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Location precision classification
///
/// Ordered by specificity: a `Range` location beats a `Line` location beats a
/// bare `File` reference. Used both to pick the more specific location when
/// merging duplicates and as a consumer-facing filter field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// File-level only, no line information
    File,
    /// Single line
    Line,
    /// Start/end line range
    Range,
}

/// Location of a finding within a file or resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// File path or resource identifier
    pub file: String,
    /// Starting line number (1-indexed)
    pub start: Option<u32>,
    /// Ending line number (1-indexed)
    pub end: Option<u32>,
}

impl SourceLocation {
    /// File-level location without line information.
    pub fn file(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            start: None,
            end: None,
        }
    }

    /// Single-line location.
    pub fn line(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            start: Some(line),
            end: Some(line),
        }
    }

    /// Line-range location.
    pub fn range(file: impl Into<String>, start: u32, end: u32) -> Self {
        Self {
            file: file.into(),
            start: Some(start),
            end: Some(end),
        }
    }

    /// Classify how precise this location is.
    pub fn precision(&self) -> Precision {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start != end => Precision::Range,
            (Some(_), _) => Precision::Line,
            (None, _) => Precision::File,
        }
    }
}

/// Kind of evidence a pointer refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceKind {
    File,
    Url,
    Log,
}

/// Pointer to supporting evidence for a finding
///
/// Owned by the finding that references it; deduplicated structurally when
/// two findings merge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvidencePointer {
    /// What the reference points at
    pub kind: EvidenceKind,
    /// The reference itself (path, URL, or log stream name)
    pub reference: String,
    /// Optional line span within the referenced resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<(u32, u32)>,
}

impl EvidencePointer {
    pub fn new(kind: EvidenceKind, reference: impl Into<String>) -> Self {
        Self {
            kind,
            reference: reference.into(),
            lines: None,
        }
    }

    /// Restrict the pointer to a line span (chainable).
    pub fn with_lines(mut self, start: u32, end: u32) -> Self {
        self.lines = Some((start, end));
        self
    }
}
