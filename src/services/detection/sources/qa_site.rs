// Q&A-site search (Stack Exchange advanced search)

use async_trait::async_trait;
use serde_json::Value;

use super::{count_scaled, parse_url, QueryTally, SourceAdapter, SourceError, SourceHttp};
use crate::models::{Document, Evidence, PartialResult, Provider};
use crate::services::text_processor::extract_technical_terms;

const DEFAULT_URL: &str = "https://api.stackexchange.com/2.3/search/advanced";
const MAX_TERMS: usize = 3;
const RESULT_STEP: f64 = 0.1;
const RESULT_CAP: f64 = 0.7;

pub struct QaSiteAdapter {
    http: SourceHttp,
    base_url: String,
    /// Optional; raises the anonymous request quota.
    key: Option<String>,
}

impl QaSiteAdapter {
    pub fn new(http: SourceHttp, base_url: Option<String>, key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.unwrap_or_else(|| DEFAULT_URL.to_string()),
            key,
        }
    }

    async fn search(&self, term: &str) -> Result<Value, SourceError> {
        let mut url = parse_url(&self.base_url)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("order", "desc")
                .append_pair("sort", "relevance")
                .append_pair("q", term)
                .append_pair("site", "stackoverflow")
                .append_pair("pagesize", "10");
            if let Some(key) = &self.key {
                pairs.append_pair("key", key);
            }
        }
        self.http.send_json(self.http.get(url)).await
    }
}

pub(crate) fn evidence_from_search(term: &str, data: &Value) -> Option<Evidence> {
    let items = data["items"].as_array()?;
    let top = items.first()?;
    Some(Evidence::new(
        Provider::QaSite,
        term,
        top["link"].as_str().unwrap_or(""),
        top["title"].as_str().unwrap_or("Q&A thread"),
        count_scaled(items.len(), RESULT_STEP, RESULT_CAP),
    ))
}

#[async_trait]
impl SourceAdapter for QaSiteAdapter {
    fn provider(&self) -> Provider {
        Provider::QaSite
    }

    async fn query(&self, document: &Document) -> Result<PartialResult, SourceError> {
        let terms = extract_technical_terms(document.text());
        let mut tally = QueryTally::new(self.provider());
        let mut evidence = Vec::new();

        for (i, term) in terms.iter().take(MAX_TERMS).enumerate() {
            if i > 0 {
                self.http.pause().await;
            }
            if let Some(data) = tally.record(term, self.search(term).await) {
                evidence.extend(evidence_from_search(term, &data));
            }
        }

        tally.finish(evidence)
    }
}
