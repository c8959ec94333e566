// Configuration Storage Service
// Handles config file read/write and version backup

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::text_processor::DEFAULT_SENTENCE_MIN_LENGTH;

pub const DEFAULT_EVIDENCE_CAP: usize = 12;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub detection: DetectionConfig,
    /// Keyed by provider name (`duckduckgo`, `wikipedia`, `github`, ...).
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub enabled: bool,
    pub https: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionConfig {
    #[serde(default = "default_evidence_cap")]
    pub evidence_cap: usize,
    #[serde(default = "default_sentence_min_length")]
    pub sentence_min_length: usize,
    /// Upper bound for any single adapter or AI-branch call, enforced by the engine.
    #[serde(default = "default_overall_timeout")]
    pub overall_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Courtesy delay between an adapter's own sequential sub-requests.
    #[serde(default = "default_request_spacing")]
    pub request_spacing_ms: u64,
    #[serde(default = "default_classifier_chars")]
    pub classifier_max_chars: usize,
    #[serde(default = "default_classifier_retry_chars")]
    pub classifier_retry_chars: usize,
    #[serde(default = "default_chunk_chars")]
    pub chunk_size_chars: usize,
    #[serde(default = "default_generative_concurrency")]
    pub generative_max_concurrency: usize,
    /// Per-chunk bound; the whole generative side is still capped by `overall_timeout_secs`.
    #[serde(default = "default_generative_timeout")]
    pub generative_timeout_secs: u64,
    /// `name[:model]`, e.g. `gemini:gemini-1.5-flash` or `openai:gpt-4o-mini`.
    #[serde(default = "default_generative_provider")]
    pub generative_provider: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            evidence_cap: DEFAULT_EVIDENCE_CAP,
            sentence_min_length: DEFAULT_SENTENCE_MIN_LENGTH,
            overall_timeout_secs: 30,
            request_timeout_secs: 8,
            request_spacing_ms: 1000,
            classifier_max_chars: 1500,
            classifier_retry_chars: 800,
            chunk_size_chars: 2500,
            generative_max_concurrency: 3,
            generative_timeout_secs: 25,
            generative_provider: default_generative_provider(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: None,
            base_url: None,
        }
    }
}

fn default_true() -> bool { true }
fn default_evidence_cap() -> usize { DEFAULT_EVIDENCE_CAP }
fn default_sentence_min_length() -> usize { DEFAULT_SENTENCE_MIN_LENGTH }
fn default_overall_timeout() -> u64 { 30 }
fn default_request_timeout() -> u64 { 8 }
fn default_request_spacing() -> u64 { 1000 }
fn default_classifier_chars() -> usize { 1500 }
fn default_classifier_retry_chars() -> usize { 800 }
fn default_chunk_chars() -> usize { 2500 }
fn default_generative_concurrency() -> usize { 3 }
fn default_generative_timeout() -> u64 { 25 }
fn default_generative_provider() -> String { "gemini:gemini-1.5-flash".to_string() }

impl AppConfig {
    pub fn provider_enabled(&self, provider: &str) -> bool {
        self.providers.get(provider).map_or(true, |p| p.enabled)
    }

    pub fn provider_url(&self, provider: &str) -> Option<String> {
        self.providers
            .get(provider)
            .and_then(|p| p.base_url.clone())
            .filter(|u| !u.trim().is_empty())
    }

    pub fn provider_model(&self, provider: &str) -> Option<String> {
        self.providers
            .get(provider)
            .and_then(|p| p.model.clone())
            .filter(|m| !m.trim().is_empty())
    }
}

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("integrity-scan"))
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> Result<(), String> {
        fs::create_dir_all(&self.config_dir)
            .map_err(|e| format!("Failed to create config dir: {}", e))
    }

    /// Load configuration from file
    pub fn load(&self) -> Result<AppConfig, String> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file)
            .map_err(|e| format!("Failed to read config: {}", e))?;

        serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig) -> Result<(), String> {
        self.ensure_dir()?;

        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(&self.config_file, content)
            .map_err(|e| format!("Failed to write config: {}", e))
    }

    fn create_backup(&self) -> Result<(), String> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir)
            .map_err(|e| format!("Failed to create backup dir: {}", e))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%.3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));

        fs::copy(&self.config_file, &backup_file)
            .map_err(|e| format!("Failed to create backup: {}", e))?;

        self.cleanup_old_backups(&backup_dir, 10)
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> Result<(), String> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)
            .map_err(|e| format!("Failed to read backup dir: {}", e))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Backup names embed a sortable timestamp
        entries.sort_by_key(|e| e.file_name());

        let remove_count = entries.len() - keep;
        for entry in entries.iter().take(remove_count) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }

    pub fn get_api_key(&self, provider: &str) -> Result<Option<String>, String> {
        let config = self.load()?;
        Ok(config
            .api_keys
            .get(provider)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty()))
    }

    pub fn set_api_key(&self, provider: &str, key: &str) -> Result<(), String> {
        let mut config = self.load()?;
        config.api_keys.insert(provider.to_string(), key.to_string());
        self.save(&config)
    }

    pub fn delete_api_key(&self, provider: &str) -> Result<(), String> {
        let mut config = self.load()?;
        config.api_keys.remove(provider);
        self.save(&config)
    }

    pub fn set_provider_url(&self, provider: &str, url: &str) -> Result<(), String> {
        let mut config = self.load()?;
        let provider_config = config.providers.entry(provider.to_string()).or_default();
        provider_config.base_url = Some(url.to_string());
        self.save(&config)
    }
}
