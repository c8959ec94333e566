// Encyclopedia summary lookup (Wikipedia REST summary endpoint)

use async_trait::async_trait;
use serde_json::Value;

use super::{parse_url, QueryTally, SourceAdapter, SourceError, SourceHttp};
use crate::models::{Document, Evidence, PartialResult, Provider};
use crate::services::similarity::similarity;
use crate::services::text_processor::extract_keywords;

const DEFAULT_URL: &str = "https://en.wikipedia.org/api/rest_v1/page/summary";
const MAX_SENTENCES: usize = 2;
const TITLE_KEYWORDS: usize = 3;
const ACCEPT_SIMILARITY: f64 = 0.3;
const MAX_CONFIDENCE: f64 = 0.8;

pub struct EncyclopediaAdapter {
    http: SourceHttp,
    base_url: String,
}

impl EncyclopediaAdapter {
    pub fn new(http: SourceHttp, base_url: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.unwrap_or_else(|| DEFAULT_URL.to_string()),
        }
    }

    async fn summary(&self, title: &str) -> Result<Value, SourceError> {
        let mut url = parse_url(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| SourceError::Url(self.base_url.clone()))?
            .pop_if_empty()
            .push(title);
        self.http.send_json(self.http.get(url)).await
    }
}

pub(crate) fn title_for(sentence: &str) -> Option<String> {
    let keywords = extract_keywords(sentence);
    if keywords.is_empty() {
        return None;
    }
    Some(
        keywords
            .into_iter()
            .take(TITLE_KEYWORDS)
            .collect::<Vec<_>>()
            .join(" "),
    )
}

pub(crate) fn evidence_from_summary(sentence: &str, data: &Value) -> Option<Evidence> {
    let extract = data["extract"].as_str().unwrap_or("");
    let score = similarity(sentence, extract);
    if score <= ACCEPT_SIMILARITY {
        return None;
    }
    Some(Evidence::new(
        Provider::Encyclopedia,
        sentence,
        data["content_urls"]["desktop"]["page"].as_str().unwrap_or(""),
        data["title"].as_str().unwrap_or("Encyclopedia article"),
        score.min(MAX_CONFIDENCE),
    ))
}

#[async_trait]
impl SourceAdapter for EncyclopediaAdapter {
    fn provider(&self) -> Provider {
        Provider::Encyclopedia
    }

    async fn query(&self, document: &Document) -> Result<PartialResult, SourceError> {
        let mut tally = QueryTally::new(self.provider());
        let mut evidence = Vec::new();
        let mut issued = 0;

        for sentence in document.sentences() {
            if issued >= MAX_SENTENCES {
                break;
            }
            let Some(title) = title_for(sentence) else {
                continue;
            };
            if issued > 0 {
                self.http.pause().await;
            }
            issued += 1;

            match self.summary(&title).await {
                Err(SourceError::NotFound) => tally.record_miss(),
                result => {
                    if let Some(data) = tally.record(&title, result) {
                        evidence.extend(evidence_from_summary(sentence, &data));
                    }
                }
            }
        }

        tally.finish(evidence)
    }
}
