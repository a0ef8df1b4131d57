// src/bootstrap.rs
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_cron_scheduler::JobScheduler;
use tracing::info;

use crate::analyze::build_classifier;
use crate::config::{AppConfig, USER_AGENT};
use crate::ingest::providers::{news_api::NewsApiAdapter, youtube::YouTubeAdapter};
use crate::ingest::scheduler::{self, ScheduleRegistry};
use crate::ingest::{CycleTimeouts, Orchestrator, SourceSettings};
use crate::store::{MemoryStore, Store};

/// Everything the process needs, wired from one [`AppConfig`].
pub struct Runtime {
    pub cfg: AppConfig,
    pub store: Arc<dyn Store>,
    pub orchestrator: Arc<Orchestrator>,
    pub registry: Arc<ScheduleRegistry>,
}

impl Runtime {
    pub async fn from_config(cfg: AppConfig) -> anyhow::Result<Self> {
        // Safe diagnostics: only presence of secrets, never values
        info!(
            news_enabled = cfg.news.enabled,
            youtube_enabled = cfg.youtube.enabled,
            channels = cfg.youtube.channel_ids.len(),
            labels = cfg.classifier.labels.len(),
            threshold = cfg.classifier.threshold,
            secrets = ?cfg.secrets,
            "ingest config loaded"
        );

        let store: Arc<dyn Store> = match cfg.store.snapshot_path.as_ref() {
            Some(path) => Arc::new(
                MemoryStore::open(path)
                    .await
                    .with_context(|| format!("opening store snapshot {}", path.display()))?,
            ),
            None => Arc::new(MemoryStore::new()),
        };

        let http = http_client()?;
        let orchestrator = Arc::new(build_orchestrator(&cfg, http, Arc::clone(&store)));
        let registry = Arc::new(ScheduleRegistry::from_config(&cfg, &orchestrator.sources())?);

        Ok(Self {
            cfg,
            store,
            orchestrator,
            registry,
        })
    }

    /// Start cron jobs and the start-up runs.
    pub async fn start_scheduler(&self) -> anyhow::Result<JobScheduler> {
        scheduler::start(Arc::clone(&self.registry), Arc::clone(&self.orchestrator)).await
    }
}

/// Shared HTTP client; per-request timeouts are set by each caller.
pub fn http_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("building http client")
}

/// Orchestrator with every enabled source registered.
pub fn build_orchestrator(
    cfg: &AppConfig,
    http: reqwest::Client,
    store: Arc<dyn Store>,
) -> Orchestrator {
    let timeouts = CycleTimeouts::from(&cfg.timeouts);
    let classifier = build_classifier(
        http.clone(),
        &cfg.classifier,
        cfg.secrets.hf_api_token.clone(),
        timeouts.classify,
    );

    let mut orch = Orchestrator::new(
        classifier,
        store,
        cfg.classifier.labels.clone(),
        cfg.classifier.threshold,
    )
    .with_timeouts(timeouts);

    if cfg.news.enabled {
        let adapter = NewsApiAdapter::new(
            http.clone(),
            &cfg.news,
            cfg.secrets.news_api_key.clone(),
            timeouts.fetch,
        );
        orch = orch.with_source(
            Arc::new(adapter),
            SourceSettings {
                classify: cfg.news.classify,
                update_policy: cfg.news.update_policy,
            },
        );
    }
    if cfg.youtube.enabled {
        let adapter = YouTubeAdapter::new(
            http,
            &cfg.youtube,
            cfg.secrets.youtube_api_key.clone(),
            timeouts.fetch,
        );
        orch = orch.with_source(
            Arc::new(adapter),
            SourceSettings {
                classify: cfg.youtube.classify,
                update_policy: cfg.youtube.update_policy,
            },
        );
    }
    orch
}
