// AI Provider Service
// Generative-model chat calls and the AI-text classifier

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

use super::config_store::AppConfig;

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEEPSEEK_DEFAULT_URL: &str = "https://api.deepseek.com/chat/completions";
const GLM_DEFAULT_URL: &str = "https://open.bigmodel.cn/api/paas/v4/chat/completions";
const GEMINI_DEFAULT_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const HF_CLASSIFIER_DEFAULT_URL: &str =
    "https://api-inference.huggingface.co/models/roberta-base-openai-detector";

pub const GEMINI_DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Input rejected as too large: {0}")]
    PayloadTooLarge(String),
    #[error("Missing content in response")]
    MissingContent,
    #[error("JSON parse error: {0}")]
    JsonError(String),
    #[error("API key not configured")]
    MissingApiKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub name: String,
    pub model: String,
}

pub fn parse_provider(spec: &str) -> ProviderSpec {
    let parts: Vec<&str> = spec.splitn(2, ':').collect();
    if parts.len() == 2 {
        ProviderSpec {
            name: parts[0].trim().to_string(),
            model: parts[1].trim().to_string(),
        }
    } else {
        ProviderSpec {
            name: spec.trim().to_string(),
            model: String::new(),
        }
    }
}

/// Produces free-form text from a system and user prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn model_id(&self) -> String;

    async fn generate(&self, system: &str, user: &str) -> Result<String, ProviderError>;
}

/// Scores a text sample's likelihood of being machine-generated.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    fn model_id(&self) -> String;

    /// Returns a raw AI-likelihood in [0, 1].
    async fn classify(&self, sample: &str) -> Result<f64, ProviderError>;
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: i32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageResponse>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    pub content: String,
    pub latency_ms: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct ClassifierLabel {
    label: String,
    score: f64,
}

/// Response is `[[{label, score}, ...]]` or `[{label, score}, ...]` depending on pipeline version.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ClassifierResponse {
    Nested(Vec<Vec<ClassifierLabel>>),
    Flat(Vec<ClassifierLabel>),
}

impl ClassifierResponse {
    fn into_labels(self) -> Vec<ClassifierLabel> {
        match self {
            ClassifierResponse::Nested(v) => v.into_iter().flatten().collect(),
            ClassifierResponse::Flat(v) => v,
        }
    }
}

/// Shared HTTP client for model providers. Built once at startup and injected.
#[derive(Clone)]
pub struct ProviderClient {
    client: Client,
}

impl ProviderClient {
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_proxy(timeout: Duration, proxy_url: &str) -> Result<Self, ProviderError> {
        let proxy = reqwest::Proxy::all(proxy_url)?;
        let client = Client::builder().timeout(timeout).proxy(proxy).build()?;
        Ok(Self { client })
    }

    /// OpenAI-compatible chat completions (OpenAI, DeepSeek, GLM).
    pub async fn call_chat_api(
        &self,
        url: &str,
        model: &str,
        api_key: &str,
        system: &str,
        user: &str,
        max_tokens: i32,
    ) -> Result<ChatResult, ProviderError> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_tokens,
            temperature: 0.0,
            response_format: Some(ResponseFormat {
                r#type: "json_object".to_string(),
            }),
        };

        let start = Instant::now();

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let content = data
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ProviderError::MissingContent)?;

        Ok(ChatResult { content, latency_ms })
    }

    /// Gemini `generateContent`; system and user prompts are sent as one user turn.
    pub async fn call_gemini(
        &self,
        base_url: &str,
        model: &str,
        api_key: &str,
        system: &str,
        user: &str,
        max_tokens: i32,
    ) -> Result<ChatResult, ProviderError> {
        let combined_content = if system.is_empty() {
            user.to_string()
        } else {
            format!("{}\n\n{}", system, user)
        };

        let request = serde_json::json!({
            "contents": [{"role": "user", "parts": [{"text": combined_content}]}],
            "generationConfig": {"temperature": 0.0, "maxOutputTokens": max_tokens}
        });

        let url = format!("{}/{}:generateContent", base_url.trim_end_matches('/'), model);
        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let content = data["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or(ProviderError::MissingContent)?;

        Ok(ChatResult { content, latency_ms })
    }

    /// Hugging Face text-classification inference.
    pub async fn call_classifier(
        &self,
        url: &str,
        api_key: &str,
        sample: &str,
    ) -> Result<f64, ProviderError> {
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&serde_json::json!({ "inputs": sample }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if is_size_rejection(status, &body) {
                return Err(ProviderError::PayloadTooLarge(body));
            }
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: ClassifierResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        ai_score_from_labels(&data.into_labels()).ok_or(ProviderError::MissingContent)
    }
}

fn is_size_rejection(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        return true;
    }
    let lower = body.to_lowercase();
    [
        "too long",
        "sequence length",
        "maximum length",
        "index out of range",
        "token indices",
        "input is too large",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}

fn ai_score_from_labels(labels: &[ClassifierLabel]) -> Option<f64> {
    const AI_LABELS: &[&str] = &["fake", "label_1", "ai", "ai-generated", "machine", "chatgpt"];
    const HUMAN_LABELS: &[&str] = &["real", "label_0", "human", "human-written"];

    let find = |names: &[&str]| {
        labels
            .iter()
            .find(|l| names.contains(&l.label.to_lowercase().as_str()))
            .map(|l| l.score)
    };

    find(AI_LABELS)
        .or_else(|| find(HUMAN_LABELS).map(|h| 1.0 - h))
        .map(|s| s.clamp(0.0, 1.0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChatBackend {
    OpenAiCompatible,
    Gemini,
}

/// Generative model reached through the provider client.
pub struct GenerativeModel {
    client: ProviderClient,
    backend: ChatBackend,
    provider: String,
    url: String,
    model: String,
    api_key: String,
    max_tokens: i32,
}

impl GenerativeModel {
    /// Returns `None` when the provider is unknown or has no API key.
    pub fn from_config(client: ProviderClient, config: &AppConfig) -> Option<Self> {
        let spec = parse_provider(&config.detection.generative_provider);
        if !config.provider_enabled(&spec.name) {
            return None;
        }
        let (backend, default_url, default_model) = match spec.name.as_str() {
            "gemini" => (ChatBackend::Gemini, GEMINI_DEFAULT_URL, GEMINI_DEFAULT_MODEL),
            "openai" => (ChatBackend::OpenAiCompatible, OPENAI_DEFAULT_URL, OPENAI_DEFAULT_MODEL),
            "deepseek" => (ChatBackend::OpenAiCompatible, DEEPSEEK_DEFAULT_URL, "deepseek-chat"),
            "glm" => (ChatBackend::OpenAiCompatible, GLM_DEFAULT_URL, "glm-4-flash"),
            _ => return None,
        };
        let api_key = get_api_key(&spec.name, config)?;
        let model = if spec.model.is_empty() {
            config
                .provider_model(&spec.name)
                .unwrap_or_else(|| default_model.to_string())
        } else {
            spec.model
        };
        Some(Self {
            client,
            backend,
            url: config
                .provider_url(&spec.name)
                .unwrap_or_else(|| default_url.to_string()),
            provider: spec.name,
            model,
            api_key,
            max_tokens: 2048,
        })
    }
}

#[async_trait]
impl TextGenerator for GenerativeModel {
    fn model_id(&self) -> String {
        format!("{}:{}", self.provider, self.model)
    }

    async fn generate(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let result = match self.backend {
            ChatBackend::Gemini => {
                self.client
                    .call_gemini(&self.url, &self.model, &self.api_key, system, user, self.max_tokens)
                    .await?
            }
            ChatBackend::OpenAiCompatible => {
                self.client
                    .call_chat_api(&self.url, &self.model, &self.api_key, system, user, self.max_tokens)
                    .await?
            }
        };
        debug!(
            model = %self.model_id(),
            latency_ms = result.latency_ms,
            chars = result.content.chars().count(),
            "[PROVIDERS] generation finished"
        );
        Ok(result.content)
    }
}

/// Hosted AI-text classifier (Hugging Face inference API).
pub struct HostedClassifier {
    client: ProviderClient,
    url: String,
    api_key: String,
}

impl HostedClassifier {
    pub fn from_config(client: ProviderClient, config: &AppConfig) -> Option<Self> {
        if !config.provider_enabled("huggingface") {
            return None;
        }
        let api_key = get_api_key("huggingface", config)?;
        Some(Self {
            client,
            url: config
                .provider_url("huggingface")
                .unwrap_or_else(|| HF_CLASSIFIER_DEFAULT_URL.to_string()),
            api_key,
        })
    }
}

#[async_trait]
impl TextClassifier for HostedClassifier {
    fn model_id(&self) -> String {
        self.url.rsplit('/').next().unwrap_or("classifier").to_string()
    }

    async fn classify(&self, sample: &str) -> Result<f64, ProviderError> {
        self.client.call_classifier(&self.url, &self.api_key, sample).await
    }
}

/// Get API key from environment or config
pub fn get_api_key(provider: &str, config: &AppConfig) -> Option<String> {
    let env_keys = match provider {
        "gemini" => vec!["GEMINI_API_KEY", "INTEGRITY_GEMINI_API_KEY"],
        "openai" => vec!["OPENAI_API_KEY", "INTEGRITY_OPENAI_API_KEY"],
        "deepseek" => vec!["DEEPSEEK_API_KEY", "INTEGRITY_DEEPSEEK_API_KEY"],
        "glm" => vec!["GLM_API_KEY", "INTEGRITY_GLM_API_KEY"],
        "huggingface" => vec!["HUGGINGFACE_API_KEY", "HF_TOKEN"],
        "github" => vec!["GITHUB_TOKEN", "INTEGRITY_GITHUB_TOKEN"],
        "stackexchange" => vec!["STACKEXCHANGE_KEY", "INTEGRITY_STACKEXCHANGE_KEY"],
        _ => vec![],
    };

    for key in env_keys {
        if let Ok(val) = env::var(key) {
            let v = val.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    config
        .api_keys
        .get(provider)
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}
