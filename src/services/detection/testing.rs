// Test doubles for adapters and model providers

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::models::{Document, Evidence, PartialResult, Provider};
use crate::services::providers::{ProviderError, TextClassifier, TextGenerator};

use super::sources::{SourceAdapter, SourceError, SourceHttp};

enum Behavior {
    Return(PartialResult),
    Fail,
    Panic,
}

pub struct ScriptedAdapter {
    provider: Provider,
    behavior: Behavior,
    delay: Duration,
    available: bool,
    calls: AtomicUsize,
}

impl ScriptedAdapter {
    fn with_behavior(provider: Provider, behavior: Behavior) -> Self {
        Self {
            provider,
            behavior,
            delay: Duration::ZERO,
            available: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn scored(provider: Provider, score: f64) -> Self {
        Self::with_behavior(provider, Behavior::Return(PartialResult::with_score(score, vec![])))
    }

    pub fn with_evidence(provider: Provider, evidence: Vec<(&str, f64)>) -> Self {
        let evidence = evidence
            .into_iter()
            .map(|(text, conf)| {
                Evidence::new(
                    provider,
                    text,
                    format!("https://{}.example/{}", provider, conf),
                    provider.to_string(),
                    conf,
                )
            })
            .collect();
        Self::with_behavior(provider, Behavior::Return(PartialResult::from_evidence(evidence)))
    }

    pub fn failing(provider: Provider) -> Self {
        Self::with_behavior(provider, Behavior::Fail)
    }

    pub fn panicking(provider: Provider) -> Self {
        Self::with_behavior(provider, Behavior::Panic)
    }

    pub fn delayed(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn query(&self, _document: &Document) -> Result<PartialResult, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.behavior {
            Behavior::Return(p) => Ok(p.clone()),
            Behavior::Fail => Err(SourceError::Status {
                status: 503,
                body: "connection reset".to_string(),
            }),
            Behavior::Panic => panic!("scripted adapter panic"),
        }
    }
}

/// Replies with the response of the first rule whose needle occurs in the user prompt.
pub struct ScriptedGenerator {
    rules: Vec<(String, Option<String>)>,
    default: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn always(response: &str) -> Self {
        Self {
            rules: vec![],
            default: Some(response.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    /// `None` response simulates a transport failure.
    pub fn when(mut self, needle: &str, response: Option<&str>) -> Self {
        self.rules.push((needle.to_string(), response.map(str::to_string)));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn model_id(&self) -> String {
        "scripted:generator".to_string()
    }

    async fn generate(&self, _system: &str, user: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self
            .rules
            .iter()
            .find(|(needle, _)| user.contains(needle.as_str()))
            .map(|(_, r)| r.clone())
            .unwrap_or_else(|| self.default.clone());
        response.ok_or(ProviderError::ApiError {
            status: 500,
            message: "scripted failure".to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ClassifierStep {
    Score(f64),
    TooLarge,
    Fail,
}

pub struct ScriptedClassifier {
    steps: Mutex<VecDeque<ClassifierStep>>,
    sample_lengths: Mutex<Vec<usize>>,
}

impl ScriptedClassifier {
    pub fn new(steps: Vec<ClassifierStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            sample_lengths: Mutex::new(vec![]),
        }
    }

    /// Character counts of every sample received, in call order.
    pub fn sample_lengths(&self) -> Vec<usize> {
        self.sample_lengths.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextClassifier for ScriptedClassifier {
    fn model_id(&self) -> String {
        "scripted-classifier".to_string()
    }

    async fn classify(&self, sample: &str) -> Result<f64, ProviderError> {
        self.sample_lengths.lock().unwrap().push(sample.chars().count());
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(ClassifierStep::Fail);
        match step {
            ClassifierStep::Score(s) => Ok(s),
            ClassifierStep::TooLarge => Err(ProviderError::PayloadTooLarge("too long".to_string())),
            ClassifierStep::Fail => Err(ProviderError::ApiError {
                status: 503,
                message: "unavailable".to_string(),
            }),
        }
    }
}

/// Address where nothing listens; every request fails at connect.
pub const UNROUTABLE_URL: &str = "http://127.0.0.1:9/";

/// Direct client; local stubs must not go through an environment proxy.
pub fn test_http() -> SourceHttp {
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    SourceHttp::new(client, Duration::from_secs(2), Duration::ZERO)
}

/// Local HTTP/1.1 server answering each connection with the next scripted
/// `(status, body)` pair and closing it. Stops listening once the script runs out.
pub struct StubServer {
    url: String,
    hits: Arc<AtomicUsize>,
}

impl StubServer {
    pub async fn start(responses: Vec<(u16, &str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let responses: Vec<(u16, String)> =
            responses.into_iter().map(|(status, body)| (status, body.to_string())).collect();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                read_request_head(&mut socket).await;
                let reply = format!(
                    "HTTP/1.1 {} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self { url, hits }
    }

    /// Base URL with `path` appended, e.g. `url("/search.json")`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn read_request_head(socket: &mut TcpStream) {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
}
