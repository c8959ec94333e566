// AI-probability branch
// Runs the classifier probe and the generative analyzer side by side and blends their scores.

use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::models::{clamp_unit, Highlight};

use super::classifier::ClassifierProbe;
use super::llm_analyzer::{GenerativeAnalyzer, GenerativeSummary};

const CLASSIFIER_WEIGHT: f64 = 0.6;
const GENERATIVE_WEIGHT: f64 = 0.4;

/// Weighted blend when both sides report; a lone side passes through; neither gives 0.
pub fn blend(classifier: Option<f64>, generative: Option<f64>) -> f64 {
    let blended = match (classifier, generative) {
        (Some(c), Some(g)) => CLASSIFIER_WEIGHT * c + GENERATIVE_WEIGHT * g,
        (Some(c), None) => c,
        (None, Some(g)) => g,
        (None, None) => 0.0,
    };
    clamp_unit(blended)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AiAssessment {
    pub ai_probability: f64,
    pub classifier_score: Option<f64>,
    pub generative: Option<GenerativeSummary>,
}

impl AiAssessment {
    pub fn highlights(&self) -> Vec<Highlight> {
        self.generative
            .as_ref()
            .map(|g| g.ai_highlights.clone())
            .unwrap_or_default()
    }
}

#[derive(Default)]
pub struct AiBranch {
    classifier: Option<ClassifierProbe>,
    analyzer: Option<GenerativeAnalyzer>,
    deadline: Option<Duration>,
}

impl AiBranch {
    pub fn new(classifier: Option<ClassifierProbe>, analyzer: Option<GenerativeAnalyzer>) -> Self {
        Self {
            classifier,
            analyzer,
            deadline: None,
        }
    }

    /// Bound applied to each side independently.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn has_generator(&self) -> bool {
        self.analyzer.is_some()
    }

    pub async fn assess(&self, text: &str) -> AiAssessment {
        let classifier_side = async {
            match &self.classifier {
                Some(probe) => bounded(self.deadline, "classifier", probe.score(text)).await,
                None => None,
            }
        };
        let generative_side = async {
            match &self.analyzer {
                Some(analyzer) => bounded(self.deadline, "generative", analyzer.analyze(text)).await,
                None => None,
            }
        };

        let (classifier_score, generative) = tokio::join!(classifier_side, generative_side);
        let ai_probability = blend(classifier_score, generative.as_ref().map(|g| g.ai_probability));

        info!(
            classifier = ?classifier_score,
            generative = ?generative.as_ref().map(|g| g.ai_probability),
            ai_probability,
            "[AI_BRANCH] blended"
        );

        AiAssessment {
            ai_probability,
            classifier_score,
            generative,
        }
    }
}

async fn bounded<T>(
    deadline: Option<Duration>,
    side: &str,
    fut: impl Future<Output = Option<T>>,
) -> Option<T> {
    let Some(deadline) = deadline else {
        return fut.await;
    };
    match tokio::time::timeout(deadline, fut).await {
        Ok(value) => value,
        Err(_) => {
            warn!(side, deadline_ms = deadline.as_millis() as u64, "[AI_BRANCH] side timed out");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::detection::testing::{ClassifierStep, ScriptedClassifier, ScriptedGenerator};
    use std::sync::Arc;

    fn probe(steps: Vec<ClassifierStep>) -> ClassifierProbe {
        ClassifierProbe::new(Arc::new(ScriptedClassifier::new(steps)))
    }

    fn analyzer(response: &str) -> GenerativeAnalyzer {
        GenerativeAnalyzer::new(Arc::new(ScriptedGenerator::always(response)))
    }

    #[test]
    fn test_blend_cases() {
        assert!((blend(Some(0.9), Some(0.5)) - 0.74).abs() < 1e-9);
        assert_eq!(blend(Some(0.9), None), 0.9);
        assert_eq!(blend(None, Some(0.3)), 0.3);
        assert_eq!(blend(None, None), 0.0);
        assert_eq!(blend(Some(1.0), Some(1.0)), 1.0);
    }

    #[tokio::test]
    async fn test_both_sides_blend() {
        let branch = AiBranch::new(
            Some(probe(vec![ClassifierStep::Score(0.9)])),
            Some(analyzer(r#"{"aiProbability": 0.5}"#)),
        );
        let a = branch.assess("A moderately long passage of text to analyse.").await;
        assert_eq!(a.classifier_score, Some(0.9));
        assert!((a.ai_probability - 0.74).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_classifier_only_when_generator_fails() {
        let generator = ScriptedGenerator::always("unused").when("passage", None);
        let branch = AiBranch::new(
            Some(probe(vec![ClassifierStep::Score(0.9)])),
            Some(GenerativeAnalyzer::new(Arc::new(generator))),
        );
        let a = branch.assess("Some text.").await;
        assert!(a.generative.is_none());
        assert_eq!(a.ai_probability, 0.9);
    }

    #[tokio::test]
    async fn test_nothing_configured_is_zero() {
        let branch = AiBranch::default();
        assert!(!branch.has_classifier() && !branch.has_generator());
        let a = branch.assess("Some text.").await;
        assert_eq!(a.ai_probability, 0.0);
        assert!(a.highlights().is_empty());
    }

    #[tokio::test]
    async fn test_slow_side_is_dropped_at_deadline() {
        struct Stalled;

        #[async_trait::async_trait]
        impl crate::services::providers::TextClassifier for Stalled {
            fn model_id(&self) -> String {
                "stalled".to_string()
            }

            async fn classify(&self, _sample: &str) -> Result<f64, crate::services::providers::ProviderError> {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(1.0)
            }
        }

        let branch = AiBranch::new(
            Some(ClassifierProbe::new(Arc::new(Stalled))),
            Some(analyzer(r#"{"aiProbability": 0.3}"#)),
        )
        .with_deadline(Duration::from_millis(100));
        let a = branch.assess("Some text.").await;
        assert_eq!(a.classifier_score, None);
        assert_eq!(a.ai_probability, 0.3);
    }
}
