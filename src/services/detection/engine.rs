// Detection Engine
// Entry point for one detection request: split, fan out, assess AI likelihood,
// merge, classify. Collaborators are built once and injected.

use chrono::Utc;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{
    AdapterOutcome, AggregateResult, Document, OutcomeStatus, PartialResult, Provider,
};
use crate::services::config_store::{AppConfig, DEFAULT_EVIDENCE_CAP};
use crate::services::providers::{
    GenerativeModel, HostedClassifier, ProviderClient, ProviderError, TextGenerator,
};
use crate::services::text_processor::{normalize_punctuation, split_sentences, DEFAULT_SENTENCE_MIN_LENGTH};

use super::ai_probability::{AiAssessment, AiBranch};
use super::classifier::ClassifierProbe;
use super::fan_out::{AdapterRegistry, FanOutCoordinator};
use super::llm_analyzer::GenerativeAnalyzer;
use super::merge::merge;
use super::sources::{default_adapters, SourceAdapter, SourceHttp};
use super::verdict::classify;

const DEFAULT_DEADLINE_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to build provider client: {0}")]
    Provider(#[from] ProviderError),
}

pub struct EngineBuilder {
    registry: AdapterRegistry,
    classifier: Option<ClassifierProbe>,
    analyzer: Option<GenerativeAnalyzer>,
    deadline: Duration,
    evidence_cap: usize,
    sentence_min_length: usize,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            registry: AdapterRegistry::default(),
            classifier: None,
            analyzer: None,
            deadline: Duration::from_secs(DEFAULT_DEADLINE_SECS),
            evidence_cap: DEFAULT_EVIDENCE_CAP,
            sentence_min_length: DEFAULT_SENTENCE_MIN_LENGTH,
        }
    }
}

impl EngineBuilder {
    /// Registration order is the dedup tie-break.
    pub fn adapter(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.registry.register(adapter);
        self
    }

    pub fn adapters(mut self, adapters: impl IntoIterator<Item = Arc<dyn SourceAdapter>>) -> Self {
        for adapter in adapters {
            self.registry.register(adapter);
        }
        self
    }

    pub fn classifier(mut self, probe: ClassifierProbe) -> Self {
        self.classifier = Some(probe);
        self
    }

    pub fn generative(mut self, analyzer: GenerativeAnalyzer) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn evidence_cap(mut self, cap: usize) -> Self {
        self.evidence_cap = cap;
        self
    }

    pub fn sentence_min_length(mut self, min_len: usize) -> Self {
        self.sentence_min_length = min_len;
        self
    }

    pub fn build(self) -> DetectionEngine {
        DetectionEngine {
            coordinator: FanOutCoordinator::new(self.registry, self.deadline),
            ai: AiBranch::new(self.classifier, self.analyzer).with_deadline(self.deadline),
            evidence_cap: self.evidence_cap,
            sentence_min_length: self.sentence_min_length,
        }
    }
}

pub struct DetectionEngine {
    coordinator: FanOutCoordinator,
    ai: AiBranch,
    evidence_cap: usize,
    sentence_min_length: usize,
}

impl DetectionEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Wires the HTTP adapters and model providers described by `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, EngineError> {
        let detection = &config.detection;
        let request_timeout = Duration::from_secs(detection.request_timeout_secs);
        let generative_timeout = Duration::from_secs(detection.generative_timeout_secs);

        let proxy_url = config
            .proxy
            .as_ref()
            .filter(|p| p.enabled)
            .and_then(|p| p.https.clone())
            .filter(|u| !u.trim().is_empty());

        let mut http = Client::builder().timeout(request_timeout);
        if let Some(url) = &proxy_url {
            http = http.proxy(reqwest::Proxy::all(url.as_str())?);
        }
        let source_http = SourceHttp::new(
            http.build()?,
            request_timeout,
            Duration::from_millis(detection.request_spacing_ms),
        );

        let provider_client = match &proxy_url {
            Some(url) => ProviderClient::with_proxy(generative_timeout, url)?,
            None => ProviderClient::new(generative_timeout)?,
        };

        let mut builder = Self::builder()
            .adapters(default_adapters(&source_http, config))
            .deadline(Duration::from_secs(detection.overall_timeout_secs))
            .evidence_cap(detection.evidence_cap)
            .sentence_min_length(detection.sentence_min_length);

        match HostedClassifier::from_config(provider_client.clone(), config) {
            Some(classifier) => {
                builder = builder.classifier(
                    ClassifierProbe::new(Arc::new(classifier)).with_sample_sizes(
                        detection.classifier_max_chars,
                        detection.classifier_retry_chars,
                    ),
                );
            }
            None => warn!("[ENGINE] classifier not configured"),
        }

        match GenerativeModel::from_config(provider_client, config) {
            Some(model) => {
                info!(model = %model.model_id(), "[ENGINE] generative model configured");
                builder = builder.generative(
                    GenerativeAnalyzer::new(Arc::new(model))
                        .with_chunk_chars(detection.chunk_size_chars)
                        .with_max_concurrency(detection.generative_max_concurrency)
                        .with_chunk_timeout(generative_timeout),
                );
            }
            None => warn!(
                provider = %detection.generative_provider,
                "[ENGINE] generative model not configured"
            ),
        }

        Ok(builder.build())
    }

    /// Never fails; unreachable providers simply contribute nothing.
    pub async fn run_detection(&self, text: &str) -> AggregateResult {
        let started = Instant::now();
        let request_id = Uuid::new_v4().to_string();

        let normalized = normalize_punctuation(text);
        let sentences = split_sentences(&normalized, self.sentence_min_length);
        let document = Arc::new(Document::new(normalized, sentences));

        info!(
            request_id = %request_id,
            chars = document.text().chars().count(),
            sentences = document.sentences().len(),
            adapters = self.coordinator.registry().len(),
            classifier = self.ai.has_classifier(),
            generative = self.ai.has_generator(),
            "[ENGINE] detection started"
        );

        let (mut outcomes, assessment) = if document.has_sentences() {
            tokio::join!(
                self.coordinator.run_all(Arc::clone(&document)),
                self.ai.assess(document.text())
            )
        } else {
            info!(request_id = %request_id, "[ENGINE] no qualifying sentence, skipping providers");
            (self.skipped_outcomes("no qualifying sentence"), AiAssessment::default())
        };

        if document.has_sentences() {
            outcomes.push(self.generative_outcome(&assessment));
        } else if self.ai.has_generator() {
            outcomes.push(skipped(Provider::GenerativeModel, "no qualifying sentence"));
        }

        let partials: Vec<&PartialResult> = outcomes.iter().filter_map(AdapterOutcome::partial).collect();
        let merged = merge(&partials, self.evidence_cap);
        let verdict = classify(assessment.ai_probability, merged.plagiarism_score);

        info!(
            request_id = %request_id,
            plagiarism_score = merged.plagiarism_score,
            ai_probability = assessment.ai_probability,
            evidence = merged.evidence.len(),
            verdict = %verdict,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "[ENGINE] detection finished"
        );

        AggregateResult {
            plagiarism_score: merged.plagiarism_score,
            ai_probability: assessment.ai_probability,
            evidence: merged.evidence,
            verdict,
            ai_highlights: assessment.highlights(),
            sources: outcomes.iter().map(AdapterOutcome::report).collect(),
            request_id,
            analyzed_at: Utc::now(),
        }
    }

    fn skipped_outcomes(&self, reason: &str) -> Vec<AdapterOutcome> {
        self.coordinator
            .registry()
            .iter()
            .map(|a| skipped(a.provider(), reason))
            .collect()
    }

    /// Generative plagiarism output, registered after every adapter.
    fn generative_outcome(&self, assessment: &AiAssessment) -> AdapterOutcome {
        let status = match (&assessment.generative, self.ai.has_generator()) {
            (Some(summary), _) => OutcomeStatus::Completed(summary.plagiarism_partial()),
            (None, true) => OutcomeStatus::Failed("no usable chunk analysis".to_string()),
            (None, false) => OutcomeStatus::Skipped("not configured".to_string()),
        };
        AdapterOutcome {
            provider: Provider::GenerativeModel,
            status,
            elapsed_ms: 0,
        }
    }
}

fn skipped(provider: Provider, reason: &str) -> AdapterOutcome {
    AdapterOutcome {
        provider,
        status: OutcomeStatus::Skipped(reason.to_string()),
        elapsed_ms: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReportStatus, Verdict};
    use crate::services::detection::sources::ForumAdapter;
    use crate::services::detection::testing::{
        test_http, ClassifierStep, ScriptedAdapter, ScriptedClassifier, ScriptedGenerator, UNROUTABLE_URL,
    };

    const TEXT: &str = "The mitochondria is the powerhouse of the cell. \
        Photosynthesis converts light energy into chemical energy in plants.";

    fn arc(adapter: ScriptedAdapter) -> Arc<dyn SourceAdapter> {
        Arc::new(adapter)
    }

    #[tokio::test]
    async fn test_zero_sentences_yields_original() {
        let adapter = Arc::new(ScriptedAdapter::scored(Provider::Forum, 0.9));
        let engine = DetectionEngine::builder()
            .adapter(adapter.clone())
            .classifier(ClassifierProbe::new(Arc::new(ScriptedClassifier::new(vec![
                ClassifierStep::Score(0.99),
            ]))))
            .build();

        let result = engine.run_detection("Too short. Tiny! Eh?").await;
        assert_eq!(result.plagiarism_score, 0.0);
        assert_eq!(result.ai_probability, 0.0);
        assert!(result.evidence.is_empty());
        assert_eq!(result.verdict, Verdict::Original);
        assert_eq!(result.verdict.label(), "Content appears original");
        assert_eq!(adapter.calls(), 0);
        assert_eq!(result.sources[0].status, ReportStatus::Skipped);
    }

    #[tokio::test]
    async fn test_failing_adapter_is_absent_and_max_wins() {
        let engine = DetectionEngine::builder()
            .adapter(arc(ScriptedAdapter::failing(Provider::KnowledgeSearch)))
            .adapter(arc(ScriptedAdapter::with_evidence(Provider::Encyclopedia, vec![("cell biology intro", 0.2)])))
            .adapter(arc(ScriptedAdapter::with_evidence(Provider::Forum, vec![("reddit thread on cells", 0.5)])))
            .adapter(arc(ScriptedAdapter::with_evidence(Provider::QaSite, vec![("stack question", 0.65)])))
            .build();

        let result = engine.run_detection(TEXT).await;
        assert_eq!(result.plagiarism_score, 0.65);
        assert_eq!(result.evidence.len(), 3);
        assert!(result.evidence.iter().all(|e| e.origin != Provider::KnowledgeSearch));
        assert_eq!(result.sources[0].status, ReportStatus::Failed);
        assert_eq!(result.verdict, Verdict::Plagiarism);
        assert_eq!(result.ai_probability, 0.0);
    }

    #[tokio::test]
    async fn test_duplicate_goes_to_first_registered_regardless_of_timing() {
        let engine = DetectionEngine::builder()
            .adapter(arc(
                ScriptedAdapter::with_evidence(Provider::Encyclopedia, vec![("The Powerhouse Of The Cell", 0.4)])
                    .delayed(80),
            ))
            .adapter(arc(ScriptedAdapter::with_evidence(
                Provider::Quotations,
                vec![("the powerhouse of the cell", 0.4)],
            )))
            .build();

        let result = engine.run_detection(TEXT).await;
        assert_eq!(result.evidence.len(), 1);
        assert_eq!(result.evidence[0].origin, Provider::Encyclopedia);
    }

    #[tokio::test]
    async fn test_ai_branch_blends_and_generative_plagiarism_merges() {
        let response = r#"{"aiProbability": 0.5, "aiHighlights": [{"sentence": "The mitochondria is the powerhouse of the cell", "reason": "cliche"}],
            "plagiarismProbability": 0.45, "plagiarismHighlights": [{"sentence": "Photosynthesis converts light energy", "reason": "textbook"}],
            "sources": [{"title": "Biology 101", "url": "https://bio.example"}]}"#;
        let engine = DetectionEngine::builder()
            .adapter(arc(ScriptedAdapter::scored(Provider::KnowledgeSearch, 0.1)))
            .classifier(ClassifierProbe::new(Arc::new(ScriptedClassifier::new(vec![ClassifierStep::Score(0.9)]))))
            .generative(GenerativeAnalyzer::new(Arc::new(ScriptedGenerator::always(response))))
            .build();

        let result = engine.run_detection(TEXT).await;
        assert!((result.ai_probability - 0.74).abs() < 1e-9);
        assert!((result.plagiarism_score - 0.45).abs() < 1e-9);
        assert_eq!(result.verdict, Verdict::AiWithPlagiarism);
        assert_eq!(result.ai_highlights.len(), 1);
        assert_eq!(result.evidence[0].origin, Provider::GenerativeModel);
        assert_eq!(result.evidence[0].source_url, "https://bio.example");
        assert_eq!(result.sources.last().map(|r| r.provider), Some(Provider::GenerativeModel));
    }

    #[tokio::test]
    async fn test_evidence_cap_and_result_metadata() {
        let many: Vec<(String, f64)> = (0..20).map(|i| (format!("matched passage {}", i), 0.3)).collect();
        let engine = DetectionEngine::builder()
            .adapter(arc(ScriptedAdapter::with_evidence(
                Provider::Forum,
                many.iter().map(|(t, c)| (t.as_str(), *c)).collect(),
            )))
            .evidence_cap(5)
            .build();

        let a = engine.run_detection(TEXT).await;
        let b = engine.run_detection(TEXT).await;
        assert_eq!(a.evidence.len(), 5);
        assert_ne!(a.request_id, b.request_id);
        assert!(Uuid::parse_str(&a.request_id).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_http_adapter_is_reported_failed() {
        let engine = DetectionEngine::builder()
            .adapter(arc(ScriptedAdapter::with_evidence(Provider::KnowledgeSearch, vec![("cell biology", 0.3)])))
            .adapter(Arc::new(ForumAdapter::new(test_http(), Some(UNROUTABLE_URL.to_string()))))
            .build();

        let result = engine.run_detection(TEXT).await;
        assert_eq!(result.plagiarism_score, 0.3);
        assert!(result.evidence.iter().all(|e| e.origin != Provider::Forum));
        let forum = &result.sources[1];
        assert_eq!(forum.provider, Provider::Forum);
        assert_eq!(forum.status, ReportStatus::Failed);
        assert!(forum.detail.as_deref().is_some_and(|d| d.contains("all 2 queries failed")));
    }

    #[tokio::test]
    async fn test_failed_classifier_retry_leaves_generative_score() {
        let classifier = Arc::new(ScriptedClassifier::new(vec![ClassifierStep::TooLarge, ClassifierStep::TooLarge]));
        let engine = DetectionEngine::builder()
            .classifier(ClassifierProbe::new(classifier.clone()))
            .generative(GenerativeAnalyzer::new(Arc::new(ScriptedGenerator::always(r#"{"aiProbability": 0.5}"#))))
            .build();

        let result = engine.run_detection(TEXT).await;
        assert_eq!(classifier.sample_lengths().len(), 2);
        assert!((result.ai_probability - 0.5).abs() < 1e-9);
        assert_eq!(result.verdict, Verdict::NeedsReview);
    }

    #[test]
    fn test_from_default_config_registers_six_adapters() {
        let engine = DetectionEngine::from_config(&AppConfig::default()).unwrap();
        assert_eq!(engine.coordinator.registry().len(), 6);
    }
}
