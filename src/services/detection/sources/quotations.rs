// Quotation database (Quotable search API)

use async_trait::async_trait;
use serde_json::Value;

use super::{parse_url, QueryTally, SourceAdapter, SourceError, SourceHttp};
use crate::models::{Document, Evidence, PartialResult, Provider};
use crate::services::similarity::similarity;
use crate::services::text_processor::extract_keywords;

const DEFAULT_URL: &str = "https://api.quotable.io/search/quotes";
const SITE_ROOT: &str = "https://api.quotable.io/quotes";
const MAX_KEYWORDS: usize = 3;
const ACCEPT_SIMILARITY: f64 = 0.4;
const MAX_CONFIDENCE: f64 = 0.8;

pub struct QuotationsAdapter {
    http: SourceHttp,
    base_url: String,
}

impl QuotationsAdapter {
    pub fn new(http: SourceHttp, base_url: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.unwrap_or_else(|| DEFAULT_URL.to_string()),
        }
    }

    async fn search(&self, keyword: &str) -> Result<Value, SourceError> {
        let mut url = parse_url(&self.base_url)?;
        url.query_pairs_mut()
            .append_pair("query", keyword)
            .append_pair("limit", "10");
        self.http.send_json(self.http.get(url)).await
    }
}

/// (keyword, sentence it came from), first keywords of the leading sentences.
pub(crate) fn keyword_targets(document: &Document) -> Vec<(String, &str)> {
    let mut targets: Vec<(String, &str)> = Vec::new();
    for sentence in document.sentences() {
        for keyword in extract_keywords(sentence) {
            if targets.len() >= MAX_KEYWORDS {
                return targets;
            }
            if !targets.iter().any(|(k, _)| *k == keyword) {
                targets.push((keyword, sentence.as_str()));
            }
        }
    }
    targets
}

pub(crate) fn evidence_from_quotes(sentence: &str, data: &Value) -> Vec<Evidence> {
    let Some(quotes) = data["results"].as_array() else {
        return vec![];
    };
    quotes
        .iter()
        .filter_map(|quote| {
            let content = quote["content"].as_str()?;
            let score = similarity(content, sentence);
            if score <= ACCEPT_SIMILARITY {
                return None;
            }
            let url = quote["_id"]
                .as_str()
                .map(|id| format!("{}/{}", SITE_ROOT, id))
                .unwrap_or_default();
            let author = quote["author"].as_str().unwrap_or("Unknown");
            Some(Evidence::new(
                Provider::Quotations,
                sentence,
                url,
                format!("Quote by {}", author),
                score.min(MAX_CONFIDENCE),
            ))
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for QuotationsAdapter {
    fn provider(&self) -> Provider {
        Provider::Quotations
    }

    async fn query(&self, document: &Document) -> Result<PartialResult, SourceError> {
        let mut tally = QueryTally::new(self.provider());
        let mut evidence = Vec::new();

        for (i, (keyword, sentence)) in keyword_targets(document).into_iter().enumerate() {
            if i > 0 {
                self.http.pause().await;
            }
            if let Some(data) = tally.record(&keyword, self.search(&keyword).await) {
                evidence.extend(evidence_from_quotes(sentence, &data));
            }
        }

        tally.finish(evidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keyword_targets_are_bounded_and_unique() {
        let doc = Document::new(
            "",
            vec![
                "Imagination rules the world of dreams".to_string(),
                "Imagination creates wonderful worlds and stories".to_string(),
            ],
        );
        let targets = keyword_targets(&doc);
        assert_eq!(targets.len(), 3);
        assert_eq!(targets[0].0, "imagination");
        assert_eq!(targets[1].0, "rules");
        assert_eq!(targets[2].0, "world");
        assert_eq!(targets[0].1, "Imagination rules the world of dreams");
    }

    #[test]
    fn test_similar_quote_is_accepted() {
        let sentence = "Imagination is more important than knowledge for scientists";
        let data = json!({"results": [
            {"_id": "q1", "content": "Imagination is more important than knowledge.", "author": "Albert Einstein"},
            {"_id": "q2", "content": "Stay hungry, stay foolish.", "author": "Steve Jobs"}
        ]});
        let evidence = evidence_from_quotes(sentence, &data);
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].source_title, "Quote by Albert Einstein");
        assert_eq!(evidence[0].source_url, "https://api.quotable.io/quotes/q1");
        assert!(evidence[0].confidence > 0.4 && evidence[0].confidence <= 0.8);
    }

    #[test]
    fn test_missing_results_yields_nothing() {
        assert!(evidence_from_quotes("anything at all", &json!({"error": "x"})).is_empty());
    }
}
