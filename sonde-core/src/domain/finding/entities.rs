//! Finding entities

use serde::{Deserialize, Serialize};

use super::value_objects::{Confidence, EvidencePointer, Precision, Severity, SourceLocation};

/// Raw diagnostic observation emitted by a plugin (unified format)
///
/// All diagnostic plugins produce findings in this shape, allowing the engine
/// to aggregate results from different plugin types. A finding is immutable
/// once emitted; deduplication happens later on the normalized form, never by
/// mutating raw findings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Plugin-assigned identifier (informational; canonical identity is the
    /// normalized fingerprint)
    pub id: String,
    /// Diagnostic area this finding belongs to (e.g. "streaming", "governance")
    pub area: String,
    /// Severity of the finding
    pub severity: Severity,
    /// Short human-readable title
    pub title: String,
    /// Longer description
    pub description: String,
    /// Supporting evidence pointers
    #[serde(default)]
    pub evidence: Vec<EvidencePointer>,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Confidence level, if the plugin reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    /// Recommended remediation, if available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    /// Producing source; when absent the normalizer substitutes a fallback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Rule identifier that triggered this finding (if applicable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// Location of the finding, if one applies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl Finding {
    /// Create a minimal finding; optional fields are filled with the
    /// chainable `with_*` methods.
    pub fn new(
        id: impl Into<String>,
        area: impl Into<String>,
        severity: Severity,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            area: area.into(),
            severity,
            title: title.into(),
            description: String::new(),
            evidence: Vec::new(),
            tags: Vec::new(),
            confidence: None,
            recommendation: None,
            source: None,
            rule_id: None,
            location: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_evidence(mut self, pointer: EvidencePointer) -> Self {
        self.evidence.push(pointer);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_rule_id(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }
}

/// Canonical, deduplicated finding used in final reports
///
/// Identity is the deterministic fingerprint in `id` (`nf_<16 hex>`), not the
/// externally supplied id: two raw findings with equal fingerprints are the
/// same logical issue and collapse into one record. Instances are never
/// mutated after insertion; merges produce a new record replacing the old one
/// in the findings collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedFinding {
    /// Fingerprint identity, `nf_<16 hex chars>`
    pub id: String,
    /// Id the raw finding carried before normalization
    pub original_id: String,
    /// Producing source (plugin id, or the fallback supplied by the caller)
    pub source: String,
    /// Rule identifier, if the raw finding carried one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// Diagnostic area
    pub area: String,
    /// Severity (highest seen across merged duplicates)
    pub severity: Severity,
    /// Short human-readable title
    pub title: String,
    /// Longer description
    pub description: String,
    /// How precise the location information is
    pub precision: Precision,
    /// Most precise location seen across merged duplicates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    /// Union of evidence pointers across merged duplicates
    #[serde(default)]
    pub evidence: Vec<EvidencePointer>,
    /// Union of tags across merged duplicates
    #[serde(default)]
    pub tags: Vec<String>,
    /// Confidence level, if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    /// Recommended remediation, if available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}
