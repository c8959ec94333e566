// Merge & Dedup
// Combines partial results into one score and a ranked, deduplicated evidence list

use std::collections::HashSet;

use crate::models::{Evidence, PartialResult};

const DEDUP_KEY_CHARS: usize = 50;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedEvidence {
    pub plagiarism_score: f64,
    pub evidence: Vec<Evidence>,
}

/// Lowercased, trimmed matched text truncated to 50 chars.
pub fn dedup_key(matched_text: &str) -> String {
    matched_text
        .trim()
        .to_lowercase()
        .chars()
        .take(DEDUP_KEY_CHARS)
        .collect()
}

/// Partials must be in adapter registration order: on duplicate keys the earliest entry wins.
pub fn merge(partials: &[&PartialResult], cap: usize) -> MergedEvidence {
    // Max, not mean: a single confident hit dominates
    let plagiarism_score = partials
        .iter()
        .map(|p| p.score)
        .fold(0.0_f64, f64::max)
        .clamp(0.0, 1.0);

    let mut seen = HashSet::new();
    let mut evidence: Vec<Evidence> = partials
        .iter()
        .flat_map(|p| p.evidence.iter())
        .filter(|e| seen.insert(dedup_key(&e.matched_text)))
        .cloned()
        .collect();

    // Stable sort keeps registration order among equal confidences
    evidence.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    evidence.truncate(cap);

    MergedEvidence {
        plagiarism_score,
        evidence,
    }
}
