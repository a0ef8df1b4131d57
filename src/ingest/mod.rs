// src/ingest/mod.rs
pub mod dedup;
pub mod providers;
pub mod scheduler;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio::time::timeout;

use crate::analyze::topics::DynClassifier;
use crate::config::TimeoutConfig;
use crate::error::StoreError;
use crate::ingest::dedup::dedupe;
use crate::ingest::types::{NormalizedItem, SourceAdapter, SourceKind};
use crate::store::{Store, UpdatePolicy, UpsertOutcome};

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Raw items returned by providers.");
        describe_counter!("ingest_fetched_total", "Items entering a cycle after dedup.");
        describe_counter!("ingest_saved_total", "Items upserted successfully.");
        describe_counter!("ingest_failed_total", "Items whose upsert failed.");
        describe_counter!("ingest_dedup_total", "Items removed as duplicate keys.");
        describe_counter!(
            "ingest_provider_errors_total",
            "Provider fetch/parse errors."
        );
        describe_counter!(
            "ingest_quota_exceeded_total",
            "Provider calls rejected for exhausted quota."
        );
        describe_counter!(
            "ingest_classify_errors_total",
            "Classifier calls that failed or timed out."
        );
        describe_counter!("ingest_runs_total", "Completed scheduled cycles.");
        describe_counter!(
            "ingest_skipped_triggers_total",
            "Triggers dropped because the source was already running."
        );
        describe_histogram!("ingest_cycle_ms", "Cycle wall time in milliseconds.");
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when a source cycle last finished."
        );
    });
}

/// Clean upstream text: decode entities, strip tags, collapse whitespace.
pub fn clean_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| {
        regex::Regex::new(r"(?is)</?[a-z][^>]*>").expect("static tag pattern")
    });
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("static ws pattern"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 4) Length cap: 2000 chars
    if out.chars().count() > 2000 {
        out = out.chars().take(2000).collect();
    }

    out
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ItemError {
    pub key: String,
    pub message: String,
}

/// Outcome of one cycle. Built fresh per run and only logged / reported.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionResult {
    pub source: SourceKind,
    /// Items left after dedup.
    pub fetched_count: usize,
    pub saved_count: usize,
    pub failed_count: usize,
    pub created_count: usize,
    pub updated_count: usize,
    pub deduped_count: usize,
    pub errors: Vec<ItemError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl IngestionResult {
    fn new(source: SourceKind, started_at: DateTime<Utc>) -> Self {
        Self {
            source,
            fetched_count: 0,
            saved_count: 0,
            failed_count: 0,
            created_count: 0,
            updated_count: 0,
            deduped_count: 0,
            errors: Vec::new(),
            started_at,
            finished_at: started_at,
        }
    }

    fn record_failure(&mut self, key: &str, err: &StoreError) {
        tracing::warn!(source = %self.source, key, error = %err, "upsert failed");
        self.failed_count += 1;
        self.errors.push(ItemError {
            key: key.to_string(),
            message: err.to_string(),
        });
    }
}

/// Per-source pipeline switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSettings {
    pub classify: bool,
    pub update_policy: UpdatePolicy,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            classify: true,
            update_policy: UpdatePolicy::TopicsOnly,
        }
    }
}

/// Upper bounds for every external call inside a cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleTimeouts {
    pub fetch: Duration,
    pub classify: Duration,
    pub upsert: Duration,
}

impl Default for CycleTimeouts {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

impl From<&TimeoutConfig> for CycleTimeouts {
    fn from(t: &TimeoutConfig) -> Self {
        Self {
            fetch: t.fetch(),
            classify: t.classify(),
            upsert: t.upsert(),
        }
    }
}

struct RegisteredSource {
    adapter: Arc<dyn SourceAdapter>,
    settings: SourceSettings,
}

/// Drives fetch → dedupe → classify → upsert for one source at a time.
pub struct Orchestrator {
    sources: HashMap<SourceKind, RegisteredSource>,
    classifier: DynClassifier,
    labels: Vec<String>,
    threshold: f64,
    store: Arc<dyn Store>,
    timeouts: CycleTimeouts,
}

impl Orchestrator {
    pub fn new(
        classifier: DynClassifier,
        store: Arc<dyn Store>,
        labels: Vec<String>,
        threshold: f64,
    ) -> Self {
        Self {
            sources: HashMap::new(),
            classifier,
            labels,
            threshold,
            store,
            timeouts: CycleTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: CycleTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Register (or replace) the adapter for its source kind.
    pub fn with_source(mut self, adapter: Arc<dyn SourceAdapter>, settings: SourceSettings) -> Self {
        self.sources
            .insert(adapter.kind(), RegisteredSource { adapter, settings });
        self
    }

    pub fn sources(&self) -> Vec<SourceKind> {
        let mut kinds: Vec<_> = self.sources.keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub fn store(&self) -> Arc<dyn Store> {
        Arc::clone(&self.store)
    }

    /// Run one full cycle. Never fails: every problem ends up in the result.
    pub async fn run_cycle(&self, source: SourceKind) -> IngestionResult {
        ensure_metrics_described();
        let t0 = Instant::now();
        let mut result = IngestionResult::new(source, Utc::now());

        let Some(registered) = self.sources.get(&source) else {
            tracing::warn!(source = %source, "no adapter registered, nothing to ingest");
            result.finished_at = Utc::now();
            return result;
        };

        // 1) Fetch; the budget covers every sequential upstream call of the batch
        let fetch_budget = self
            .timeouts
            .fetch
            .saturating_mul(registered.adapter.calls_per_batch());
        let raw = match timeout(fetch_budget, registered.adapter.fetch_batch()).await {
            Ok(items) => items,
            Err(_) => {
                tracing::warn!(
                    source = %source,
                    adapter = registered.adapter.name(),
                    timeout_s = fetch_budget.as_secs_f64(),
                    "fetch timed out, treating batch as empty"
                );
                counter!("ingest_provider_errors_total", "source" => source.as_str()).increment(1);
                Vec::new()
            }
        };

        // 2) Dedupe
        let (items, removed) = dedupe(raw);
        result.fetched_count = items.len();
        result.deduped_count = removed;

        // 3) Classify + 4) upsert, strictly one item at a time
        for mut item in items {
            if registered.settings.classify {
                item.topics = self.classify_item(&item).await;
            }

            let upsert = self.store.upsert(&item, registered.settings.update_policy);
            match timeout(self.timeouts.upsert, upsert).await {
                Ok(Ok(UpsertOutcome::Created)) => {
                    result.saved_count += 1;
                    result.created_count += 1;
                }
                Ok(Ok(UpsertOutcome::Updated)) => {
                    result.saved_count += 1;
                    result.updated_count += 1;
                }
                Ok(Err(e)) => result.record_failure(&item.natural_key, &e),
                Err(_) => result.record_failure(&item.natural_key, &StoreError::Timeout),
            }
        }

        match timeout(self.timeouts.upsert, self.store.flush()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(source = %source, error = %e, "store flush failed"),
            Err(_) => tracing::error!(source = %source, "store flush timed out"),
        }

        result.finished_at = Utc::now();
        let elapsed_ms = t0.elapsed().as_secs_f64() * 1_000.0;

        // Telemetry
        let label = source.as_str();
        counter!("ingest_fetched_total", "source" => label).increment(result.fetched_count as u64);
        counter!("ingest_saved_total", "source" => label).increment(result.saved_count as u64);
        counter!("ingest_failed_total", "source" => label).increment(result.failed_count as u64);
        counter!("ingest_dedup_total", "source" => label).increment(result.deduped_count as u64);
        histogram!("ingest_cycle_ms", "source" => label).record(elapsed_ms);
        gauge!("ingest_pipeline_last_run_ts", "source" => label)
            .set(result.finished_at.timestamp() as f64);

        tracing::info!(
            target: "ingest",
            source = %source,
            fetched = result.fetched_count,
            saved = result.saved_count,
            failed = result.failed_count,
            created = result.created_count,
            updated = result.updated_count,
            deduped = result.deduped_count,
            elapsed_ms = elapsed_ms as u64,
            "ingest cycle finished"
        );

        result
    }

    async fn classify_item(&self, item: &NormalizedItem) -> Vec<String> {
        let text = item.classification_text();
        let call = self.classifier.classify(&text, &self.labels, self.threshold);
        match timeout(self.timeouts.classify, call).await {
            Ok(topics) => topics,
            Err(_) => {
                tracing::warn!(
                    key = %item.natural_key,
                    provider = self.classifier.provider_name(),
                    "classification timed out, continuing without topics"
                );
                counter!("ingest_classify_errors_total").increment(1);
                Vec::new()
            }
        }
    }
}
