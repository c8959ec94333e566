// Forum/social search (Reddit search JSON)

use async_trait::async_trait;
use serde_json::Value;

use super::{count_scaled, parse_url, QueryTally, SourceAdapter, SourceError, SourceHttp};
use crate::models::{Document, Evidence, PartialResult, Provider};
use crate::services::text_processor::leading_fragment;

const DEFAULT_URL: &str = "https://www.reddit.com/search.json";
const SITE_ROOT: &str = "https://www.reddit.com";
const MAX_SENTENCES: usize = 2;
const FRAGMENT_CHARS: usize = 50;
const RESULT_STEP: f64 = 0.1;
const RESULT_CAP: f64 = 0.6;

pub struct ForumAdapter {
    http: SourceHttp,
    base_url: String,
}

impl ForumAdapter {
    pub fn new(http: SourceHttp, base_url: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.unwrap_or_else(|| DEFAULT_URL.to_string()),
        }
    }

    async fn search(&self, fragment: &str) -> Result<Value, SourceError> {
        let mut url = parse_url(&self.base_url)?;
        url.query_pairs_mut()
            .append_pair("q", &format!("\"{}\"", fragment))
            .append_pair("limit", "10");
        self.http.send_json(self.http.get(url)).await
    }
}

pub(crate) fn evidence_from_listing(fragment: &str, data: &Value) -> Option<Evidence> {
    let posts = data["data"]["children"].as_array()?;
    let top = &posts.first()?["data"];
    let url = top["permalink"]
        .as_str()
        .map(|p| format!("{}{}", SITE_ROOT, p))
        .unwrap_or_default();
    Some(Evidence::new(
        Provider::Forum,
        fragment,
        url,
        top["title"].as_str().unwrap_or("Forum discussion"),
        count_scaled(posts.len(), RESULT_STEP, RESULT_CAP),
    ))
}

#[async_trait]
impl SourceAdapter for ForumAdapter {
    fn provider(&self) -> Provider {
        Provider::Forum
    }

    async fn query(&self, document: &Document) -> Result<PartialResult, SourceError> {
        let mut tally = QueryTally::new(self.provider());
        let mut evidence = Vec::new();

        for (i, sentence) in document.sentences().iter().take(MAX_SENTENCES).enumerate() {
            if i > 0 {
                self.http.pause().await;
            }
            let fragment = leading_fragment(sentence, FRAGMENT_CHARS);
            if let Some(data) = tally.record(&fragment, self.search(&fragment).await) {
                evidence.extend(evidence_from_listing(&fragment, &data));
            }
        }

        tally.finish(evidence)
    }
}
