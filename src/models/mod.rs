// Integrity Scan Data Models
// Shapes shared by the adapters, the merge stage and the report consumer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============ Document ============

/// Input text of one detection request, split once and shared read-only by every adapter.
#[derive(Debug, Clone)]
pub struct Document {
    text: String,
    sentences: Vec<String>,
}

impl Document {
    pub fn new(text: impl Into<String>, sentences: Vec<String>) -> Self {
        Self {
            text: text.into(),
            sentences,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Sentences above the minimum length, in source order.
    pub fn sentences(&self) -> &[String] {
        &self.sentences
    }

    pub fn has_sentences(&self) -> bool {
        !self.sentences.is_empty()
    }
}

// ============ Providers ============

/// External provider an evidence record came from.
///
/// Declaration order matches the default adapter registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Provider {
    KnowledgeSearch,
    Encyclopedia,
    CodeHost,
    Forum,
    QaSite,
    Quotations,
    GenerativeModel,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::KnowledgeSearch => "knowledge_search",
            Provider::Encyclopedia => "encyclopedia",
            Provider::CodeHost => "code_host",
            Provider::Forum => "forum",
            Provider::QaSite => "qa_site",
            Provider::Quotations => "quotations",
            Provider::GenerativeModel => "generative_model",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============ Evidence & Partial Results ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub matched_text: String,
    pub source_url: String,
    pub source_title: String,
    pub confidence: f64,
    pub origin: Provider,
}

impl Evidence {
    pub fn new(
        origin: Provider,
        matched_text: impl Into<String>,
        source_url: impl Into<String>,
        source_title: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            matched_text: matched_text.into(),
            source_url: source_url.into(),
            source_title: source_title.into(),
            confidence: clamp_unit(confidence),
            origin,
        }
    }
}

/// One adapter's contribution for a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialResult {
    pub score: f64,
    pub evidence: Vec<Evidence>,
    /// Sub-requests issued while producing this result.
    #[serde(default)]
    pub queries: usize,
    /// Sub-requests that failed and were skipped.
    #[serde(default)]
    pub failed_queries: usize,
}

impl PartialResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Score is the strongest evidence confidence.
    pub fn from_evidence(evidence: Vec<Evidence>) -> Self {
        let score = evidence.iter().map(|e| e.confidence).fold(0.0, f64::max);
        Self {
            score: clamp_unit(score),
            evidence,
            queries: 0,
            failed_queries: 0,
        }
    }

    pub fn with_score(score: f64, evidence: Vec<Evidence>) -> Self {
        Self {
            score: clamp_unit(score),
            evidence,
            queries: 0,
            failed_queries: 0,
        }
    }

    pub fn with_query_counts(mut self, queries: usize, failed_queries: usize) -> Self {
        self.queries = queries;
        self.failed_queries = failed_queries;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeStatus {
    Completed(PartialResult),
    Failed(String),
    Skipped(String),
}

/// Settled result of one adapter invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterOutcome {
    pub provider: Provider,
    pub status: OutcomeStatus,
    pub elapsed_ms: u64,
}

impl AdapterOutcome {
    /// Contribution to the merge; failed and skipped adapters contribute nothing.
    pub fn partial(&self) -> Option<&PartialResult> {
        match &self.status {
            OutcomeStatus::Completed(p) => Some(p),
            OutcomeStatus::Failed(_) | OutcomeStatus::Skipped(_) => None,
        }
    }

    pub fn report(&self) -> ProviderReport {
        let (status, score, evidence_count, detail) = match &self.status {
            OutcomeStatus::Completed(p) => (
                ReportStatus::Ok,
                p.score,
                p.evidence.len(),
                (p.failed_queries > 0)
                    .then(|| format!("{}/{} queries failed", p.failed_queries, p.queries)),
            ),
            OutcomeStatus::Failed(reason) => (ReportStatus::Failed, 0.0, 0, Some(reason.clone())),
            OutcomeStatus::Skipped(reason) => (ReportStatus::Skipped, 0.0, 0, Some(reason.clone())),
        };
        ProviderReport {
            provider: self.provider,
            status,
            score,
            evidence_count,
            elapsed_ms: self.elapsed_ms,
            detail,
        }
    }
}

// ============ AI Branch ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub sentence: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSource {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

/// Structured verdict for one generative-model chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkAnalysis {
    pub ai_probability: f64,
    pub ai_highlights: Vec<Highlight>,
    pub plagiarism_probability: f64,
    pub plagiarism_highlights: Vec<Highlight>,
    pub sources: Vec<CandidateSource>,
    /// Substituted after an unparseable model response.
    pub is_fallback: bool,
}

// ============ Aggregate Result ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "High AI probability with significant plagiarism detected")]
    AiWithPlagiarism,
    #[serde(rename = "Likely AI-generated content")]
    LikelyAi,
    #[serde(rename = "Plagiarism detected")]
    Plagiarism,
    #[serde(rename = "Some concerns detected - manual review recommended")]
    NeedsReview,
    #[serde(rename = "Content appears original")]
    Original,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::AiWithPlagiarism => "High AI probability with significant plagiarism detected",
            Verdict::LikelyAi => "Likely AI-generated content",
            Verdict::Plagiarism => "Plagiarism detected",
            Verdict::NeedsReview => "Some concerns detected - manual review recommended",
            Verdict::Original => "Content appears original",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Ok,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderReport {
    pub provider: Provider,
    pub status: ReportStatus,
    pub score: f64,
    pub evidence_count: usize,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Final merged bundle handed to the report-storage collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub plagiarism_score: f64,
    pub ai_probability: f64,
    pub evidence: Vec<Evidence>,
    pub verdict: Verdict,
    #[serde(default)]
    pub ai_highlights: Vec<Highlight>,
    #[serde(default)]
    pub sources: Vec<ProviderReport>,
    pub request_id: String,
    pub analyzed_at: DateTime<Utc>,
}

pub(crate) fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evidence_confidence_is_clamped() {
        let e = Evidence::new(Provider::Forum, "text", "u", "t", 1.7);
        assert_eq!(e.confidence, 1.0);
        let e = Evidence::new(Provider::Forum, "text", "u", "t", f64::NAN);
        assert_eq!(e.confidence, 0.0);
    }

    #[test]
    fn test_partial_from_evidence_uses_max_confidence() {
        let p = PartialResult::from_evidence(vec![
            Evidence::new(Provider::Forum, "a", "", "", 0.2),
            Evidence::new(Provider::Forum, "b", "", "", 0.5),
        ]);
        assert_eq!(p.score, 0.5);
        assert_eq!(PartialResult::from_evidence(vec![]).score, 0.0);
    }

    #[test]
    fn test_failed_outcome_contributes_nothing() {
        let outcome = AdapterOutcome {
            provider: Provider::CodeHost,
            status: OutcomeStatus::Failed("timeout".to_string()),
            elapsed_ms: 10,
        };
        assert!(outcome.partial().is_none());
        let report = outcome.report();
        assert_eq!(report.status, ReportStatus::Failed);
        assert_eq!(report.detail.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_verdict_serializes_as_label() {
        let json = serde_json::to_string(&Verdict::NeedsReview).unwrap();
        assert_eq!(json, "\"Some concerns detected - manual review recommended\"");
        assert_eq!(Verdict::Original.to_string(), "Content appears original");
    }
}
