// Source Adapters
// One adapter per external text-matching provider. Each adapter bounds its own
// request volume, spaces its sequential sub-requests, and absorbs per-request
// failures; it only errors when every request it issued failed.

pub mod code_host;
pub mod encyclopedia;
pub mod forum;
pub mod knowledge;
pub mod qa_site;
pub mod quotations;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{Document, Evidence, PartialResult, Provider};
use crate::services::config_store::AppConfig;
use crate::services::providers::get_api_key;

pub use code_host::CodeHostAdapter;
pub use encyclopedia::EncyclopediaAdapter;
pub use forum::ForumAdapter;
pub use knowledge::KnowledgeSearchAdapter;
pub use qa_site::QaSiteAdapter;
pub use quotations::QuotationsAdapter;

const USER_AGENT: &str = concat!("integrity-scan/", env!("CARGO_PKG_VERSION"));

/// Entries kept per sub-request for count-scaled providers.
pub(crate) const MAX_EVIDENCE_PER_QUERY: usize = 3;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid request URL: {0}")]
    Url(String),
    #[error("all {attempts} queries failed, last error: {last}")]
    AllQueriesFailed { attempts: usize, last: String },
}

/// Capability shared by every external text-matching provider.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    /// False when construction found a missing credential; the adapter is then never called.
    fn is_available(&self) -> bool {
        true
    }

    async fn query(&self, document: &Document) -> Result<PartialResult, SourceError>;
}

/// HTTP plumbing shared by the adapters.
#[derive(Clone)]
pub struct SourceHttp {
    client: Client,
    timeout: Duration,
    spacing: Duration,
}

impl SourceHttp {
    pub fn new(client: Client, timeout: Duration, spacing: Duration) -> Self {
        Self {
            client,
            timeout,
            spacing,
        }
    }

    pub fn get(&self, url: Url) -> RequestBuilder {
        self.client
            .get(url)
            .timeout(self.timeout)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json")
    }

    /// Sends the request and decodes a JSON body; non-2xx statuses are errors.
    pub async fn send_json(&self, request: RequestBuilder) -> Result<Value, SourceError> {
        let response = request.send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        Ok(response.json::<Value>().await?)
    }

    /// Courtesy delay before the next sequential sub-request.
    pub async fn pause(&self) {
        if !self.spacing.is_zero() {
            tokio::time::sleep(self.spacing).await;
        }
    }
}

pub(crate) fn parse_url(base: &str) -> Result<Url, SourceError> {
    Url::parse(base).map_err(|e| SourceError::Url(format!("{}: {}", base, e)))
}

/// Confidence that grows with the number of hits, up to `cap`.
pub(crate) fn count_scaled(count: usize, step: f64, cap: f64) -> f64 {
    (count as f64 * step).min(cap)
}

/// Tracks sub-request outcomes for one adapter call.
pub(crate) struct QueryTally {
    provider: Provider,
    queries: usize,
    failed: usize,
    last_error: Option<String>,
}

impl QueryTally {
    pub(crate) fn new(provider: Provider) -> Self {
        Self {
            provider,
            queries: 0,
            failed: 0,
            last_error: None,
        }
    }

    /// Records a sub-request result; failures are logged and yield `None`.
    pub(crate) fn record<T>(&mut self, query: &str, result: Result<T, SourceError>) -> Option<T> {
        self.queries += 1;
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(
                    provider = %self.provider,
                    query = %query,
                    error = %e,
                    "[SOURCES] sub-request failed, skipping"
                );
                self.failed += 1;
                self.last_error = Some(e.to_string());
                None
            }
        }
    }

    /// A lookup that legitimately found nothing (e.g. 404 on a title lookup).
    pub(crate) fn record_miss(&mut self) {
        self.queries += 1;
    }

    pub(crate) fn finish(self, evidence: Vec<Evidence>) -> Result<PartialResult, SourceError> {
        if self.queries > 0 && self.failed == self.queries {
            return Err(SourceError::AllQueriesFailed {
                attempts: self.queries,
                last: self.last_error.unwrap_or_default(),
            });
        }
        debug!(
            provider = %self.provider,
            queries = self.queries,
            failed = self.failed,
            evidence = evidence.len(),
            "[SOURCES] adapter finished"
        );
        Ok(PartialResult::from_evidence(evidence).with_query_counts(self.queries, self.failed))
    }
}

/// Config/credential key used for each provider.
pub fn config_key(provider: Provider) -> &'static str {
    match provider {
        Provider::KnowledgeSearch => "duckduckgo",
        Provider::Encyclopedia => "wikipedia",
        Provider::CodeHost => "github",
        Provider::Forum => "reddit",
        Provider::QaSite => "stackexchange",
        Provider::Quotations => "quotable",
        Provider::GenerativeModel => "generative",
    }
}

/// The six adapters in their fixed registration order; disabled providers are left out.
pub fn default_adapters(http: &SourceHttp, config: &AppConfig) -> Vec<Arc<dyn SourceAdapter>> {
    let url = |p: Provider| config.provider_url(config_key(p));
    let key = |p: Provider| get_api_key(config_key(p), config);

    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(KnowledgeSearchAdapter::new(http.clone(), url(Provider::KnowledgeSearch))),
        Arc::new(EncyclopediaAdapter::new(http.clone(), url(Provider::Encyclopedia))),
        Arc::new(CodeHostAdapter::new(
            http.clone(),
            url(Provider::CodeHost),
            key(Provider::CodeHost),
        )),
        Arc::new(ForumAdapter::new(http.clone(), url(Provider::Forum))),
        Arc::new(QaSiteAdapter::new(
            http.clone(),
            url(Provider::QaSite),
            key(Provider::QaSite),
        )),
        Arc::new(QuotationsAdapter::new(http.clone(), url(Provider::Quotations))),
    ];

    adapters
        .into_iter()
        .filter(|a| config.provider_enabled(config_key(a.provider())))
        .collect()
}
