// Classifier probe
// Sends a leading sample of the document to the AI-text classifier, shrinking it once on a size rejection.

use std::sync::Arc;
use tracing::{info, warn};

use crate::models::clamp_unit;
use crate::services::providers::{ProviderError, TextClassifier};
use crate::services::text_processor::truncate_chars;

pub const DEFAULT_SAMPLE_CHARS: usize = 1500;
pub const DEFAULT_RETRY_SAMPLE_CHARS: usize = 800;

pub struct ClassifierProbe {
    classifier: Arc<dyn TextClassifier>,
    sample_chars: usize,
    retry_chars: usize,
}

impl ClassifierProbe {
    pub fn new(classifier: Arc<dyn TextClassifier>) -> Self {
        Self {
            classifier,
            sample_chars: DEFAULT_SAMPLE_CHARS,
            retry_chars: DEFAULT_RETRY_SAMPLE_CHARS,
        }
    }

    pub fn with_sample_sizes(mut self, sample_chars: usize, retry_chars: usize) -> Self {
        self.sample_chars = sample_chars.max(1);
        self.retry_chars = retry_chars.max(1);
        self
    }

    pub fn model_id(&self) -> String {
        self.classifier.model_id()
    }

    /// `None` means the classifier is unavailable for this document.
    pub async fn score(&self, text: &str) -> Option<f64> {
        let sample = truncate_chars(text, self.sample_chars);
        let first = match self.classifier.classify(&sample).await {
            Ok(score) => return Some(clamp_unit(score)),
            Err(e) => e,
        };

        match first {
            ProviderError::PayloadTooLarge(_) => {
                info!(
                    model = %self.classifier.model_id(),
                    retry_chars = self.retry_chars,
                    "[CLASSIFIER] sample rejected as too large, retrying shorter"
                );
                let retry = truncate_chars(text, self.retry_chars);
                match self.classifier.classify(&retry).await {
                    Ok(score) => Some(clamp_unit(score)),
                    Err(e) => {
                        warn!(error = %e, "[CLASSIFIER] retry failed, classifier unavailable");
                        None
                    }
                }
            }
            other => {
                warn!(error = %other, "[CLASSIFIER] request failed, classifier unavailable");
                None
            }
        }
    }
}
