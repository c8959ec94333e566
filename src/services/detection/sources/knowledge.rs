// Generalist knowledge search (DuckDuckGo Instant Answer API)

use async_trait::async_trait;
use serde_json::Value;

use super::{count_scaled, parse_url, QueryTally, SourceAdapter, SourceError, SourceHttp, MAX_EVIDENCE_PER_QUERY};
use crate::models::{Document, Evidence, PartialResult, Provider};
use crate::services::text_processor::leading_fragment;

const DEFAULT_URL: &str = "https://api.duckduckgo.com/";
const MAX_SENTENCES: usize = 3;
const FRAGMENT_CHARS: usize = 60;
const PREFIX_CHARS: usize = 30;
const ABSTRACT_CONFIDENCE: f64 = 0.7;
const TOPIC_STEP: f64 = 0.1;
const TOPIC_CAP: f64 = 0.6;

pub struct KnowledgeSearchAdapter {
    http: SourceHttp,
    base_url: String,
}

impl KnowledgeSearchAdapter {
    pub fn new(http: SourceHttp, base_url: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.unwrap_or_else(|| DEFAULT_URL.to_string()),
        }
    }

    async fn lookup(&self, fragment: &str) -> Result<Value, SourceError> {
        let mut url = parse_url(&self.base_url)?;
        url.query_pairs_mut()
            .append_pair("q", &format!("\"{}\"", fragment))
            .append_pair("format", "json")
            .append_pair("no_html", "1")
            .append_pair("skip_disambig", "1");
        self.http.send_json(self.http.get(url)).await
    }
}

/// Related topics may be nested one level under `Topics` groups.
fn flatten_topics(value: &Value) -> Vec<&Value> {
    let mut out = Vec::new();
    if let Some(items) = value.as_array() {
        for item in items {
            match item.get("Topics") {
                Some(nested) => out.extend(flatten_topics(nested)),
                None if item.get("Text").is_some() => out.push(item),
                None => {}
            }
        }
    }
    out
}

pub(crate) fn evidence_from_response(fragment: &str, data: &Value) -> Vec<Evidence> {
    let mut evidence = Vec::new();

    let abstract_text = data["AbstractText"].as_str().unwrap_or("");
    let prefix = leading_fragment(fragment, PREFIX_CHARS).to_lowercase();
    if !abstract_text.is_empty() && !prefix.is_empty() && abstract_text.to_lowercase().contains(&prefix) {
        evidence.push(Evidence::new(
            Provider::KnowledgeSearch,
            fragment,
            data["AbstractURL"].as_str().unwrap_or(""),
            data["Heading"].as_str().unwrap_or("Knowledge summary"),
            ABSTRACT_CONFIDENCE,
        ));
    }

    let topics = flatten_topics(&data["RelatedTopics"]);
    if !topics.is_empty() {
        let confidence = count_scaled(topics.len(), TOPIC_STEP, TOPIC_CAP);
        for topic in topics.into_iter().take(MAX_EVIDENCE_PER_QUERY) {
            evidence.push(Evidence::new(
                Provider::KnowledgeSearch,
                topic["Text"].as_str().unwrap_or(fragment),
                topic["FirstURL"].as_str().unwrap_or(""),
                "Related topic",
                confidence,
            ));
        }
    }

    evidence
}

#[async_trait]
impl SourceAdapter for KnowledgeSearchAdapter {
    fn provider(&self) -> Provider {
        Provider::KnowledgeSearch
    }

    async fn query(&self, document: &Document) -> Result<PartialResult, SourceError> {
        let mut tally = QueryTally::new(self.provider());
        let mut evidence = Vec::new();

        for (i, sentence) in document.sentences().iter().take(MAX_SENTENCES).enumerate() {
            if i > 0 {
                self.http.pause().await;
            }
            let fragment = leading_fragment(sentence, FRAGMENT_CHARS);
            if let Some(data) = tally.record(&fragment, self.lookup(&fragment).await) {
                evidence.extend(evidence_from_response(&fragment, &data));
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
    fn test_abstract_prefix_match_is_strong() {
        let fragment = "The mitochondria is the powerhouse of the cell and produces";
        let data = json!({
            "AbstractText": "The mitochondria is the powerhouse of the cell, as textbooks say.",
            "AbstractURL": "https://en.wikipedia.org/wiki/Mitochondrion",
            "Heading": "Mitochondrion",
            "RelatedTopics": []
        });
        let evidence = evidence_from_response(fragment, &data);
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].confidence, 0.7);
        assert_eq!(evidence[0].source_title, "Mitochondrion");
    }

    #[test]
    fn test_unrelated_abstract_is_ignored() {
        let data = json!({"AbstractText": "Something else entirely.", "RelatedTopics": []});
        assert!(evidence_from_response("The mitochondria is the powerhouse", &data).is_empty());
    }

    #[test]
    fn test_related_topics_scale_with_count() {
        let data = json!({
            "AbstractText": "",
            "RelatedTopics": [
                {"Text": "Topic one", "FirstURL": "https://duckduckgo.com/1"},
                {"Name": "Group", "Topics": [
                    {"Text": "Topic two", "FirstURL": "https://duckduckgo.com/2"},
                    {"Text": "Topic three", "FirstURL": "https://duckduckgo.com/3"},
                    {"Text": "Topic four", "FirstURL": "https://duckduckgo.com/4"}
                ]}
            ]
        });
        let evidence = evidence_from_response("anything", &data);
        assert_eq!(evidence.len(), 3);
        assert!(evidence.iter().all(|e| (e.confidence - 0.4).abs() < 1e-9));
        assert_eq!(evidence[1].matched_text, "Topic two");
    }

    #[test]
    fn test_many_topics_are_capped() {
        let topics: Vec<_> = (0..12).map(|i| json!({"Text": format!("t{}", i), "FirstURL": ""})).collect();
        let data = json!({"RelatedTopics": topics});
        let evidence = evidence_from_response("anything", &data);
        assert!(evidence.iter().all(|e| e.confidence == 0.6));
    }
}
