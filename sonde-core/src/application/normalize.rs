//! Finding normalization and deduplication
//!
//! Pure functions turning heterogeneous raw plugin output into canonical,
//! deduplicated records. Identity is a deterministic fingerprint over the
//! fields that describe *what* was observed and *where*; two raw findings
//! with equal fingerprints are the same logical issue regardless of which
//! plugin produced them, and collapse into one [`NormalizedFinding`].
//!
//! Output is sorted by fingerprint id, so normalizing the same input twice
//! yields element-wise identical lists.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::domain::finding::{Finding, NormalizedFinding, Precision};

/// Field separator for the fingerprint pre-image. A control character keeps
/// `("a", "bc")` and `("ab", "c")` from hashing identically.
const SEP: char = '\u{1f}';

/// Compute the stable fingerprint for a finding's identity fields.
///
/// Hashes `{source, rule_id ?? null, title, file ?? null, start ?? null,
/// end ?? null}` and renders the first eight digest bytes as
/// `nf_<16 hex chars>`.
pub fn fingerprint(
    source: &str,
    rule_id: Option<&str>,
    title: &str,
    file: Option<&str>,
    start: Option<u32>,
    end: Option<u32>,
) -> String {
    let mut pre_image = String::new();
    pre_image.push_str(source);
    pre_image.push(SEP);
    pre_image.push_str(rule_id.unwrap_or("null"));
    pre_image.push(SEP);
    pre_image.push_str(title);
    pre_image.push(SEP);
    pre_image.push_str(file.unwrap_or("null"));
    pre_image.push(SEP);
    match start {
        Some(n) => pre_image.push_str(&n.to_string()),
        None => pre_image.push_str("null"),
    }
    pre_image.push(SEP);
    match end {
        Some(n) => pre_image.push_str(&n.to_string()),
        None => pre_image.push_str("null"),
    }

    let digest = Sha256::digest(pre_image.as_bytes());
    format!("nf_{}", hex::encode(&digest[..8]))
}

/// Normalize a batch of raw findings into canonical, deduplicated form.
///
/// `fallback_source` is substituted for findings that do not carry their own
/// `source` (the engine passes the producing plugin id).
pub fn normalize(raw: &[Finding], fallback_source: &str) -> Vec<NormalizedFinding> {
    fold(Vec::new(), raw, fallback_source)
}

/// Fold new raw findings into an already-normalized collection.
///
/// Used by the workflow executor after each barrier group so downstream
/// nodes observe deduplicated, not raw, findings. `normalize` is `fold` from
/// an empty collection; folding is associative over batches, so incremental
/// folding and one-shot normalization of the concatenated input agree.
pub fn fold(
    existing: Vec<NormalizedFinding>,
    raw: &[Finding],
    fallback_source: &str,
) -> Vec<NormalizedFinding> {
    let mut by_id: BTreeMap<String, NormalizedFinding> = existing
        .into_iter()
        .map(|finding| (finding.id.clone(), finding))
        .collect();

    for finding in raw {
        let incoming = normalize_one(finding, fallback_source);
        match by_id.remove(&incoming.id) {
            Some(primary) => {
                let merged = merge(primary, incoming);
                by_id.insert(merged.id.clone(), merged);
            }
            None => {
                by_id.insert(incoming.id.clone(), incoming);
            }
        }
    }

    // BTreeMap iteration gives the deterministic fingerprint ordering.
    by_id.into_values().collect()
}

fn normalize_one(raw: &Finding, fallback_source: &str) -> NormalizedFinding {
    let source = raw
        .source
        .clone()
        .unwrap_or_else(|| fallback_source.to_string());

    let (file, start, end) = match &raw.location {
        Some(loc) => (Some(loc.file.as_str()), loc.start, loc.end),
        None => (None, None, None),
    };

    let id = fingerprint(&source, raw.rule_id.as_deref(), &raw.title, file, start, end);

    let precision = raw
        .location
        .as_ref()
        .map(|loc| loc.precision())
        .unwrap_or(Precision::File);

    let mut tags: Vec<String> = Vec::with_capacity(raw.tags.len());
    for tag in &raw.tags {
        if !tags.contains(tag) {
            tags.push(tag.clone());
        }
    }

    NormalizedFinding {
        id,
        original_id: raw.id.clone(),
        source,
        rule_id: raw.rule_id.clone(),
        area: raw.area.clone(),
        severity: raw.severity,
        title: raw.title.clone(),
        description: raw.description.clone(),
        precision,
        location: raw.location.clone(),
        evidence: raw.evidence.clone(),
        tags,
        confidence: raw.confidence,
        recommendation: raw.recommendation.clone(),
    }
}

/// Merge two findings that collapsed to one fingerprint.
///
/// The record with the higher severity wins as primary; ties keep the
/// first-seen record. Tags and evidence are unioned, the recommendation falls
/// back from primary to secondary, and the more precise location wins (ties
/// prefer primary).
fn merge(first_seen: NormalizedFinding, incoming: NormalizedFinding) -> NormalizedFinding {
    let (primary, secondary) = if incoming.severity > first_seen.severity {
        (incoming, first_seen)
    } else {
        (first_seen, incoming)
    };

    let mut tags = primary.tags.clone();
    for tag in &secondary.tags {
        if !tags.contains(tag) {
            tags.push(tag.clone());
        }
    }

    let mut evidence = primary.evidence.clone();
    for pointer in &secondary.evidence {
        if !evidence.contains(pointer) {
            evidence.push(pointer.clone());
        }
    }

    let secondary_precision = secondary
        .location
        .as_ref()
        .map(|loc| loc.precision())
        .unwrap_or(Precision::File);
    let primary_precision = primary
        .location
        .as_ref()
        .map(|loc| loc.precision())
        .unwrap_or(Precision::File);

    let (location, precision) =
        if secondary.location.is_some() && (primary.location.is_none() || secondary_precision > primary_precision)
        {
            (secondary.location.clone(), secondary_precision)
        } else {
            (primary.location.clone(), primary_precision)
        };

    let recommendation = primary
        .recommendation
        .clone()
        .or_else(|| secondary.recommendation.clone());

    let confidence = match (primary.confidence, secondary.confidence) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };

    NormalizedFinding {
        id: primary.id.clone(),
        original_id: primary.original_id.clone(),
        source: primary.source.clone(),
        rule_id: primary.rule_id.clone(),
        area: primary.area.clone(),
        severity: primary.severity,
        title: primary.title.clone(),
        description: primary.description.clone(),
        precision,
        location,
        evidence,
        tags,
        confidence,
        recommendation,
    }
}
