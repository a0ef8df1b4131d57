// src/config/mod.rs
//! Runtime configuration: `config/ingest.toml` for behaviour, environment for secrets.
//!
//! Lookup order for the file:
//! 1) `$INGEST_CONFIG_PATH` (must exist)
//! 2) `config/ingest.toml`
//! 3) built-in defaults
//!
//! API keys are never read from the file: `NEWS_API_KEY`, `YOUTUBE_API_KEY`
//! and `HF_API_TOKEN` come from the environment (a `.env` file is honoured).

pub mod classifier;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ingest::scheduler::OverlapPolicy;
use crate::store::UpdatePolicy;

pub use classifier::ClassifierConfig;

pub const ENV_CONFIG_PATH: &str = "INGEST_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/ingest.toml";

pub const ENV_NEWS_API_KEY: &str = "NEWS_API_KEY";
pub const ENV_YOUTUBE_API_KEY: &str = "YOUTUBE_API_KEY";
pub const ENV_HF_API_TOKEN: &str = "HF_API_TOKEN";

pub const USER_AGENT: &str = "aiverse-ingest/0.1";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub news: NewsConfig,
    pub youtube: YouTubeConfig,
    pub classifier: ClassifierConfig,
    pub schedule: ScheduleConfig,
    pub timeouts: TimeoutConfig,
    pub store: StoreConfig,
    #[serde(skip)]
    pub secrets: Secrets,
}

/// Credentials resolved from the environment. `None` means "not configured".
#[derive(Clone, Default)]
pub struct Secrets {
    pub news_api_key: Option<String>,
    pub youtube_api_key: Option<String>,
    pub hf_api_token: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only presence, never values.
        f.debug_struct("Secrets")
            .field("news_api_key", &self.news_api_key.is_some())
            .field("youtube_api_key", &self.youtube_api_key.is_some())
            .field("hf_api_token", &self.hf_api_token.is_some())
            .finish()
    }
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            news_api_key: env_secret(ENV_NEWS_API_KEY),
            youtube_api_key: env_secret(ENV_YOUTUBE_API_KEY),
            hf_api_token: env_secret(ENV_HF_API_TOKEN),
        }
    }
}

fn env_secret(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub query: String,
    pub language: String,
    pub sort_by: String,
    pub page_size: u32,
    /// Domain allowlist, joined with commas on the wire.
    pub domains: Vec<String>,
    /// Run the topic classifier on fetched articles.
    pub classify: bool,
    pub update_policy: UpdatePolicy,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://newsapi.org/v2/everything".to_string(),
            query: r#""artificial intelligence" OR "machine learning" OR "AI ethics" OR "LLM" OR "large language model""#.to_string(),
            language: "en".to_string(),
            sort_by: "publishedAt".to_string(),
            page_size: 50,
            domains: ["techcrunch.com", "wired.com", "arstechnica.com", "theverge.com"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            classify: true,
            update_policy: UpdatePolicy::TopicsOnly,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YouTubeConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub channel_ids: Vec<String>,
    /// Videos requested per channel.
    pub max_results: u32,
    /// Skip the remaining channels of a cycle once a quota signal is seen.
    pub stop_on_quota: bool,
    pub classify: bool,
    pub update_policy: UpdatePolicy,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://www.googleapis.com/youtube/v3/search".to_string(),
            channel_ids: [
                "UCbfYPyITQ-7l4upoX8nvctg", // Two Minute Papers
                "UCKMpcjL1gI4gMqwheajm86g", // Yannic Kilcher
                "UCJUJb1EKvUhCLX4hEWHr42Q", // Lex Clips
                "UCSHZKyawb77ixDdsGog4iWA", // Lex Fridman
                "UCP7jMXSY2xbc3KCAE0MHQ-A", // Google DeepMind
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_results: 5,
            stop_on_quota: false,
            classify: true,
            update_policy: UpdatePolicy::RefreshContent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSchedule {
    /// Cron expression with a leading seconds field, e.g. `0 0 * * * *`.
    pub cadence: String,
    /// IANA timezone the cadence is evaluated in.
    pub timezone: String,
    pub overlap: OverlapPolicy,
}

impl Default for SourceSchedule {
    fn default() -> Self {
        Self {
            cadence: "0 0 * * * *".to_string(),
            timezone: "UTC".to_string(),
            overlap: OverlapPolicy::Skip,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub news: SourceSchedule,
    pub youtube: SourceSchedule,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            news: SourceSchedule::default(),
            youtube: SourceSchedule {
                cadence: "0 0 */6 * * *".to_string(),
                ..SourceSchedule::default()
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub fetch_secs: u64,
    pub classify_secs: u64,
    pub upsert_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            fetch_secs: 60,
            classify_secs: 20,
            upsert_secs: 5,
        }
    }
}

impl TimeoutConfig {
    pub fn fetch(&self) -> Duration {
        Duration::from_secs(self.fetch_secs)
    }
    pub fn classify(&self) -> Duration {
        Duration::from_secs(self.classify_secs)
    }
    pub fn upsert(&self) -> Duration {
        Duration::from_secs(self.upsert_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot written after every cycle. `None` keeps the store in memory only.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: Some(PathBuf::from("data/store.json")),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        let mut cfg: AppConfig = toml::from_str(s)?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Load from an explicit path. Secrets are not touched.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Resolve the file via env + fallbacks, then attach secrets from the environment.
    pub fn load_default() -> Result<Self, ConfigError> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(ConfigError::MissingFile(pb.display().to_string()));
            }
            Self::load_from(&pb)?
        } else {
            let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                Self::load_from(&default_path)?
            } else {
                tracing::info!(path = DEFAULT_CONFIG_PATH, "no config file, using defaults");
                let mut cfg = AppConfig::default();
                cfg.sanitize();
                cfg
            }
        };
        cfg.secrets = Secrets::from_env();
        Ok(cfg)
    }

    fn sanitize(&mut self) {
        self.news.page_size = self.news.page_size.clamp(1, 50);
        self.youtube.max_results = self.youtube.max_results.clamp(1, 10);
        self.youtube.channel_ids = clean_list(std::mem::take(&mut self.youtube.channel_ids));
        self.news.domains = clean_list(std::mem::take(&mut self.news.domains));
        self.classifier.sanitize();

        let defaults = TimeoutConfig::default();
        if self.timeouts.fetch_secs == 0 {
            self.timeouts.fetch_secs = defaults.fetch_secs;
        }
        if self.timeouts.classify_secs == 0 {
            self.timeouts.classify_secs = defaults.classify_secs;
        }
        if self.timeouts.upsert_secs == 0 {
            self.timeouts.upsert_secs = defaults.upsert_secs;
        }
    }
}

/// Trim, drop blanks and duplicates, keep first-seen order.
fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .map(|it| it.trim().to_string())
        .filter(|it| !it.is_empty() && seen.insert(it.clone()))
        .collect()
}
