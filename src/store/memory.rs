// src/store/memory.rs
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::ingest::types::{NormalizedItem, SourceKind};
use crate::store::{
    sort_records, validate_item, RecordQuery, Store, StoredRecord, UpdatePolicy, UpsertOutcome,
};

type Key = (SourceKind, String);

/// Map-backed store, safe to share across concurrently running cycles.
///
/// With a snapshot path, state is loaded on [`MemoryStore::open`] and written
/// back atomically (tmp file + rename) on every [`Store::flush`]. Flushes
/// from concurrently finishing cycles are serialised on `flush_gate`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<Key, StoredRecord>>,
    snapshot_path: Option<PathBuf>,
    flush_gate: tokio::sync::Mutex<()>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    records: Vec<StoredRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a snapshot-backed store. A missing file starts empty.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut records = HashMap::new();
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let snap: Snapshot = serde_json::from_str(&content)?;
                for rec in snap.records {
                    records.insert((rec.kind, rec.natural_key.clone()), rec);
                }
                tracing::info!(path = %path.display(), records = records.len(), "store snapshot loaded");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no store snapshot yet, starting empty");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(Self {
            records: RwLock::new(records),
            snapshot_path: Some(path),
            flush_gate: tokio::sync::Mutex::new(()),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<Key, StoredRecord>>, StoreError> {
        self.records
            .read()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<Key, StoredRecord>>, StoreError> {
        self.records
            .write()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert(
        &self,
        item: &NormalizedItem,
        policy: UpdatePolicy,
    ) -> Result<UpsertOutcome, StoreError> {
        validate_item(item)?;
        let now = Utc::now();
        let mut map = self.write()?;
        match map.get_mut(&(item.kind, item.natural_key.clone())) {
            Some(existing) => {
                existing.apply_update(item, policy, now);
                Ok(UpsertOutcome::Updated)
            }
            None => {
                map.insert(
                    (item.kind, item.natural_key.clone()),
                    StoredRecord::from_item(item, now),
                );
                Ok(UpsertOutcome::Created)
            }
        }
    }

    async fn get(&self, kind: SourceKind, key: &str) -> Result<Option<StoredRecord>, StoreError> {
        Ok(self.read()?.get(&(kind, key.to_string())).cloned())
    }

    async fn list(
        &self,
        kind: SourceKind,
        query: &RecordQuery,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let mut out: Vec<StoredRecord> = {
            let map = self.read()?;
            map.values()
                .filter(|r| r.kind == kind)
                .filter(|r| query.topic.as_deref().map_or(true, |t| r.has_topic(t)))
                .cloned()
                .collect()
        };
        sort_records(&mut out, query.sort, query.order);
        out.truncate(query.limit);
        Ok(out)
    }

    async fn count(&self, kind: SourceKind) -> Result<usize, StoreError> {
        Ok(self.read()?.values().filter(|r| r.kind == kind).count())
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let Some(path) = self.snapshot_path.as_ref() else {
            return Ok(());
        };
        // One writer at a time owns the tmp file until it is renamed.
        let _gate = self.flush_gate.lock().await;

        let mut records: Vec<StoredRecord> = self.read()?.values().cloned().collect();
        records.sort_by(|a, b| (a.kind, &a.natural_key).cmp(&(b.kind, &b.natural_key)));
        let json = serde_json::to_string_pretty(&Snapshot {
            version: 1,
            records,
        })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(key: &str, title: &str, topics: &[&str]) -> NormalizedItem {
        let mut it = NormalizedItem::new(SourceKind::News, key, title);
        it.topics = topics.iter().map(|s| s.to_string()).collect();
        it
    }

    #[tokio::test]
    async fn second_upsert_updates_instead_of_duplicating() {
        let store = MemoryStore::new();
        let a = article("https://x.test/a", "A", &[]);
        assert_eq!(
            store.upsert(&a, UpdatePolicy::TopicsOnly).await.unwrap(),
            UpsertOutcome::Created
        );
        assert_eq!(
            store.upsert(&a, UpdatePolicy::TopicsOnly).await.unwrap(),
            UpsertOutcome::Updated
        );
        assert_eq!(store.count(SourceKind::News).await.unwrap(), 1);
        assert_eq!(store.count(SourceKind::Video).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn same_key_in_different_kinds_are_separate_records() {
        let store = MemoryStore::new();
        store
            .upsert(&article("k", "article", &[]), UpdatePolicy::TopicsOnly)
            .await
            .unwrap();
        store
            .upsert(
                &NormalizedItem::new(SourceKind::Video, "k", "video"),
                UpdatePolicy::TopicsOnly,
            )
            .await
            .unwrap();
        assert_eq!(store.count(SourceKind::News).await.unwrap(), 1);
        assert_eq!(store.count(SourceKind::Video).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn list_filters_by_topic_and_limits() {
        let store = MemoryStore::new();
        for (k, topics) in [
            ("a", vec!["Robotics"]),
            ("b", vec!["AI Ethics", "Robotics"]),
            ("c", vec![]),
        ] {
            store
                .upsert(&article(k, k, &topics), UpdatePolicy::TopicsOnly)
                .await
                .unwrap();
        }
        let q = RecordQuery {
            topic: Some("robotics".into()),
            limit: 1,
            sort: crate::store::SortField::Title,
            order: crate::store::SortOrder::Asc,
        };
        let out = store.list(SourceKind::News, &q).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].natural_key, "a");
    }

    #[tokio::test]
    async fn snapshot_round_trips_through_flush_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = MemoryStore::open(&path).await.unwrap();
        store
            .upsert(&article("https://x.test/a", "A", &["Robotics"]), UpdatePolicy::TopicsOnly)
            .await
            .unwrap();
        store.flush().await.unwrap();
        assert!(path.exists());

        let reopened = MemoryStore::open(&path).await.unwrap();
        let rec = reopened
            .get(SourceKind::News, "https://x.test/a")
            .await
            .unwrap()
            .expect("record survives reopen");
        assert_eq!(rec.topics, vec!["Robotics".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_flushes_all_succeed_and_leave_valid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = std::sync::Arc::new(MemoryStore::open(&path).await.unwrap());
        for i in 0..2000 {
            store
                .upsert(
                    &article(&format!("https://x.test/{i}"), "Title", &["Robotics"]),
                    UpdatePolicy::TopicsOnly,
                )
                .await
                .unwrap();
        }

        for _ in 0..25 {
            let a = tokio::spawn({
                let store = store.clone();
                async move { store.flush().await }
            });
            let b = tokio::spawn({
                let store = store.clone();
                async move { store.flush().await }
            });
            a.await.unwrap().unwrap();
            b.await.unwrap().unwrap();
        }

        let reopened = MemoryStore::open(&path).await.unwrap();
        assert_eq!(reopened.count(SourceKind::News).await.unwrap(), 2000);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn invalid_item_is_rejected() {
        let store = MemoryStore::new();
        let err = store
            .upsert(&article("", "t", &[]), UpdatePolicy::TopicsOnly)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }
}
