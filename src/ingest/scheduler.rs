// src/ingest/scheduler.rs
//! Per-source scheduling: one cron job plus one start-up trigger per source.
//!
//! Each source owns a [`ScheduleEntry`] in the [`ScheduleRegistry`]. Runs of
//! the same source never overlap (see [`OverlapPolicy`]); different sources
//! run in parallel on the runtime's worker threads. A cycle runs in its own
//! task so a panic is contained at this boundary and the cron job keeps
//! firing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::{AppConfig, SourceSchedule};
use crate::error::ConfigError;
use crate::ingest::types::SourceKind;
use crate::ingest::{IngestionResult, Orchestrator};

/// What to do with a trigger that arrives while the same source is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Drop the trigger; the next cadence tick picks up new content.
    #[default]
    Skip,
    /// Run once more after the active run. Further triggers while one is
    /// already waiting are merged into it.
    Queue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    Startup,
    Cadence,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Completed,
    /// Dropped under [`OverlapPolicy::Skip`].
    Skipped,
    /// Merged into an already-queued run under [`OverlapPolicy::Queue`].
    Coalesced,
    /// The cycle task panicked; logged and counted.
    Panicked,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStatus {
    pub running: bool,
    pub runs: u64,
    pub skipped: u64,
    pub panics: u64,
    pub last_trigger: Option<TriggerReason>,
    pub last_started: Option<DateTime<Utc>>,
    pub last_finished: Option<DateTime<Utc>>,
    pub last_result: Option<IngestionResult>,
}

pub struct ScheduleEntry {
    source: SourceKind,
    cadence: String,
    timezone: Tz,
    overlap: OverlapPolicy,
    gate: tokio::sync::Mutex<()>,
    queued: AtomicBool,
    status: Mutex<RunStatus>,
}

impl ScheduleEntry {
    pub fn new(source: SourceKind, sched: &SourceSchedule) -> Result<Self, ConfigError> {
        let timezone: Tz = sched
            .timezone
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(sched.timezone.clone()))?;
        validate_cadence(source, &sched.cadence)?;
        Ok(Self {
            source,
            cadence: sched.cadence.trim().to_string(),
            timezone,
            overlap: sched.overlap,
            gate: tokio::sync::Mutex::new(()),
            queued: AtomicBool::new(false),
            status: Mutex::new(RunStatus::default()),
        })
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn cadence(&self) -> &str {
        &self.cadence
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn overlap(&self) -> OverlapPolicy {
        self.overlap
    }

    pub fn status(&self) -> RunStatus {
        self.lock_status().clone()
    }

    fn lock_status(&self) -> MutexGuard<'_, RunStatus> {
        // Status is plain counters; a poisoned lock still holds usable data.
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn note_skipped(&self, reason: TriggerReason) {
        self.lock_status().skipped += 1;
        counter!("ingest_skipped_triggers_total", "source" => self.source.as_str()).increment(1);
        tracing::info!(
            source = %self.source,
            trigger = ?reason,
            policy = ?self.overlap,
            "previous run still active, trigger not started"
        );
    }

    fn mark_started(&self, reason: TriggerReason) {
        let mut st = self.lock_status();
        st.running = true;
        st.last_trigger = Some(reason);
        st.last_started = Some(Utc::now());
    }

    fn mark_finished(&self, result: Option<IngestionResult>) {
        let mut st = self.lock_status();
        st.running = false;
        st.last_finished = Some(Utc::now());
        match result {
            Some(r) => {
                st.runs += 1;
                st.last_result = Some(r);
            }
            None => st.panics += 1,
        }
    }
}

/// The cron crate behind the scheduler wants 6 or 7 fields (leading seconds).
fn validate_cadence(source: SourceKind, cadence: &str) -> Result<(), ConfigError> {
    let fields = cadence.split_whitespace().count();
    if fields == 6 || fields == 7 {
        Ok(())
    } else {
        Err(ConfigError::InvalidCadence {
            source_name: source.to_string(),
            cadence: cadence.to_string(),
            reason: format!("expected 6 or 7 fields (sec min hour dom mon dow [year]), got {fields}"),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntrySnapshot {
    pub source: SourceKind,
    pub cadence: String,
    pub timezone: String,
    pub overlap: OverlapPolicy,
    pub status: RunStatus,
}

/// All schedule state of the process, built once at startup.
#[derive(Default)]
pub struct ScheduleRegistry {
    entries: Vec<Arc<ScheduleEntry>>,
}

impl ScheduleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the entry for `source`.
    pub fn register(&mut self, source: SourceKind, sched: &SourceSchedule) -> Result<(), ConfigError> {
        let entry = Arc::new(ScheduleEntry::new(source, sched)?);
        self.entries.retain(|e| e.source != source);
        self.entries.push(entry);
        Ok(())
    }

    /// Entries for every enabled source in `cfg` that the orchestrator can run.
    pub fn from_config(cfg: &AppConfig, runnable: &[SourceKind]) -> Result<Self, ConfigError> {
        let mut reg = Self::new();
        if cfg.news.enabled && runnable.contains(&SourceKind::News) {
            reg.register(SourceKind::News, &cfg.schedule.news)?;
        }
        if cfg.youtube.enabled && runnable.contains(&SourceKind::Video) {
            reg.register(SourceKind::Video, &cfg.schedule.youtube)?;
        }
        Ok(reg)
    }

    pub fn entry(&self, source: SourceKind) -> Option<Arc<ScheduleEntry>> {
        self.entries.iter().find(|e| e.source == source).cloned()
    }

    pub fn entries(&self) -> &[Arc<ScheduleEntry>] {
        &self.entries
    }

    pub fn snapshot(&self) -> Vec<EntrySnapshot> {
        self.entries
            .iter()
            .map(|e| EntrySnapshot {
                source: e.source,
                cadence: e.cadence.clone(),
                timezone: e.timezone.name().to_string(),
                overlap: e.overlap,
                status: e.status(),
            })
            .collect()
    }
}

/// Fire one run of `entry`'s source, honouring its overlap policy.
pub async fn trigger(
    entry: &ScheduleEntry,
    orchestrator: &Arc<Orchestrator>,
    reason: TriggerReason,
) -> TriggerOutcome {
    let _gate = match entry.gate.try_lock() {
        Ok(guard) => guard,
        Err(_) => match entry.overlap {
            OverlapPolicy::Skip => {
                entry.note_skipped(reason);
                return TriggerOutcome::Skipped;
            }
            OverlapPolicy::Queue => {
                if entry.queued.swap(true, Ordering::SeqCst) {
                    entry.note_skipped(reason);
                    return TriggerOutcome::Coalesced;
                }
                let guard = entry.gate.lock().await;
                entry.queued.store(false, Ordering::SeqCst);
                guard
            }
        },
    };

    entry.mark_started(reason);
    let source = entry.source;
    let orch = Arc::clone(orchestrator);
    let handle = tokio::spawn(async move { orch.run_cycle(source).await });

    match handle.await {
        Ok(result) => {
            entry.mark_finished(Some(result));
            counter!("ingest_runs_total", "source" => source.as_str()).increment(1);
            TriggerOutcome::Completed
        }
        Err(e) => {
            tracing::error!(source = %source, trigger = ?reason, error = %e, "ingest cycle aborted unexpectedly");
            entry.mark_finished(None);
            TriggerOutcome::Panicked
        }
    }
}

/// Register one cron job per entry, start the scheduler, then fire the
/// start-up runs. Keep the returned handle alive for the process lifetime.
pub async fn start(
    registry: Arc<ScheduleRegistry>,
    orchestrator: Arc<Orchestrator>,
) -> anyhow::Result<JobScheduler> {
    let sched = JobScheduler::new().await.context("creating scheduler")?;

    for entry in registry.entries() {
        let job_entry = Arc::clone(entry);
        let job_orch = Arc::clone(&orchestrator);
        let job = Job::new_async_tz(entry.cadence.as_str(), entry.timezone, move |_uuid, _lock| {
            let entry = Arc::clone(&job_entry);
            let orch = Arc::clone(&job_orch);
            Box::pin(async move {
                trigger(&entry, &orch, TriggerReason::Cadence).await;
            })
        })
        .map_err(|e| ConfigError::InvalidCadence {
            source_name: entry.source.to_string(),
            cadence: entry.cadence.clone(),
            reason: format!("{e:?}"),
        })?;
        sched
            .add(job)
            .await
            .with_context(|| format!("adding scheduler job for {}", entry.source))?;

        tracing::info!(
            source = %entry.source,
            cadence = %entry.cadence,
            timezone = %entry.timezone.name(),
            overlap = ?entry.overlap,
            "source scheduled"
        );
    }

    sched.start().await.context("starting scheduler")?;

    for entry in registry.entries() {
        let entry = Arc::clone(entry);
        let orch = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            trigger(&entry, &orch, TriggerReason::Startup).await;
        });
    }

    Ok(sched)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_timezone_and_cadence_are_rejected() {
        let bad_tz = SourceSchedule {
            timezone: "Mars/Olympus".into(),
            ..Default::default()
        };
        assert!(matches!(
            ScheduleEntry::new(SourceKind::News, &bad_tz),
            Err(ConfigError::InvalidTimezone(_))
        ));

        let five_fields = SourceSchedule {
            cadence: "0 * * * *".into(),
            ..Default::default()
        };
        assert!(matches!(
            ScheduleEntry::new(SourceKind::News, &five_fields),
            Err(ConfigError::InvalidCadence { .. })
        ));
    }

    #[test]
    fn registry_skips_disabled_and_unrunnable_sources() {
        let mut cfg = AppConfig::default();
        cfg.youtube.enabled = false;
        let reg = ScheduleRegistry::from_config(&cfg, &[SourceKind::News, SourceKind::Video]).unwrap();
        assert_eq!(reg.entries().len(), 1);
        assert!(reg.entry(SourceKind::Video).is_none());

        let cfg = AppConfig::default();
        let reg = ScheduleRegistry::from_config(&cfg, &[SourceKind::Video]).unwrap();
        let entry = reg.entry(SourceKind::Video).unwrap();
        assert_eq!(entry.cadence(), "0 0 */6 * * *");
        assert_eq!(entry.timezone(), chrono_tz::UTC);
    }

    #[test]
    fn register_replaces_existing_entry() {
        let mut reg = ScheduleRegistry::new();
        reg.register(SourceKind::News, &SourceSchedule::default()).unwrap();
        let sched = SourceSchedule {
            cadence: "0 */5 * * * *".into(),
            timezone: "America/New_York".into(),
            ..Default::default()
        };
        reg.register(SourceKind::News, &sched).unwrap();
        assert_eq!(reg.entries().len(), 1);
        let snap = reg.snapshot();
        assert_eq!(snap[0].cadence, "0 */5 * * * *");
        assert_eq!(snap[0].timezone, "America/New_York");
        assert!(!snap[0].status.running);
    }
}
