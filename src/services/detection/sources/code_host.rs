// Code-host search (GitHub code search API)
// Code search requires authentication, so the adapter is a no-op without a token.

use async_trait::async_trait;
use serde_json::Value;

use super::{count_scaled, parse_url, QueryTally, SourceAdapter, SourceError, SourceHttp};
use crate::models::{Document, Evidence, PartialResult, Provider};
use crate::services::text_processor::{code_fragments, looks_like_code};

const DEFAULT_URL: &str = "https://api.github.com/search/code";
const MAX_FRAGMENTS: usize = 2;
const FRAGMENT_CHARS: usize = 100;
const RESULT_STEP: f64 = 0.15;
const RESULT_CAP: f64 = 0.9;

pub struct CodeHostAdapter {
    http: SourceHttp,
    base_url: String,
    token: Option<String>,
}

impl CodeHostAdapter {
    pub fn new(http: SourceHttp, base_url: Option<String>, token: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.unwrap_or_else(|| DEFAULT_URL.to_string()),
            token,
        }
    }

    async fn search(&self, fragment: &str, token: &str) -> Result<Value, SourceError> {
        let mut url = parse_url(&self.base_url)?;
        url.query_pairs_mut()
            .append_pair("q", &format!("\"{}\"", fragment))
            .append_pair("per_page", "5");
        let request = self
            .http
            .get(url)
            .header("Authorization", format!("Bearer {}", token))
            .header("Accept", "application/vnd.github+json");
        self.http.send_json(request).await
    }
}

/// Top result for one fragment, with confidence scaled by the number of hits.
pub(crate) fn evidence_from_search(fragment: &str, data: &Value) -> Option<Evidence> {
    let items = data["items"].as_array()?;
    let top = items.first()?;
    let repo = top["repository"]["full_name"].as_str().unwrap_or("");
    let name = top["name"].as_str().unwrap_or("");
    let title = if repo.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", repo, name)
    };
    Some(Evidence::new(
        Provider::CodeHost,
        fragment,
        top["html_url"].as_str().unwrap_or(""),
        title,
        count_scaled(items.len(), RESULT_STEP, RESULT_CAP),
    ))
}

#[async_trait]
impl SourceAdapter for CodeHostAdapter {
    fn provider(&self) -> Provider {
        Provider::CodeHost
    }

    fn is_available(&self) -> bool {
        self.token.is_some()
    }

    async fn query(&self, document: &Document) -> Result<PartialResult, SourceError> {
        let Some(token) = self.token.as_deref() else {
            return Ok(PartialResult::empty());
        };
        if !looks_like_code(document.text()) {
            return Ok(PartialResult::empty());
        }

        let mut tally = QueryTally::new(self.provider());
        let mut evidence = Vec::new();

        for (i, fragment) in code_fragments(document.text(), MAX_FRAGMENTS, FRAGMENT_CHARS)
            .iter()
            .enumerate()
        {
            if i > 0 {
                self.http.pause().await;
            }
            if let Some(data) = tally.record(fragment, self.search(fragment, token).await) {
                evidence.extend(evidence_from_search(fragment, &data));
            }
        }

        tally.finish(evidence)
    }
}
