// src/store/mod.rs
//! Store gateway: the only place the pipeline touches persistence.
//!
//! Records are addressed by `(SourceKind, natural_key)`. `upsert` creates a
//! record for an unseen key and otherwise updates it in place according to
//! the caller's [`UpdatePolicy`]; repeating the same upsert leaves the record
//! unchanged.

pub mod memory;

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::ingest::types::{NormalizedItem, SourceKind};

pub use memory::MemoryStore;

/// Which fields an upsert may rewrite on an already-stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    /// Only topics change after the first insert.
    #[default]
    TopicsOnly,
    /// Title, description, media, source label and channel are refreshed too.
    RefreshContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredRecord {
    pub natural_key: String,
    pub kind: SourceKind,
    pub title: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub source_label: Option<String>,
    pub media_url: Option<String>,
    pub channel_id: Option<String>,
    pub topics: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord {
    pub fn from_item(item: &NormalizedItem, now: DateTime<Utc>) -> Self {
        Self {
            natural_key: item.natural_key.clone(),
            kind: item.kind,
            title: item.title.clone(),
            description: item.description.clone(),
            published_at: item.published_at,
            source_label: item.source_label.clone(),
            media_url: item.media_url.clone(),
            channel_id: item.channel_id.clone(),
            topics: item.topics.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a re-fetched item. `published_at` and `created_at` are never
    /// rewritten; `updated_at` moves only when something actually changed.
    pub fn apply_update(
        &mut self,
        item: &NormalizedItem,
        policy: UpdatePolicy,
        now: DateTime<Utc>,
    ) -> bool {
        let mut changed = false;
        changed |= replace_if_different(&mut self.topics, &item.topics);
        if policy == UpdatePolicy::RefreshContent {
            changed |= replace_if_different(&mut self.title, &item.title);
            changed |= replace_if_different(&mut self.description, &item.description);
            changed |= replace_if_different(&mut self.media_url, &item.media_url);
            changed |= replace_if_different(&mut self.source_label, &item.source_label);
            changed |= replace_if_different(&mut self.channel_id, &item.channel_id);
        }
        if changed {
            self.updated_at = now;
        }
        changed
    }

    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics.iter().any(|t| t.eq_ignore_ascii_case(topic.trim()))
    }
}

fn replace_if_different<T: PartialEq + Clone>(slot: &mut T, value: &T) -> bool {
    if slot != value {
        *slot = value.clone();
        true
    } else {
        false
    }
}

/// Reject items that can never be stored.
pub fn validate_item(item: &NormalizedItem) -> Result<(), StoreError> {
    if item.natural_key.trim().is_empty() {
        return Err(StoreError::Validation("natural key is empty".into()));
    }
    if item.title.trim().is_empty() {
        return Err(StoreError::Validation(format!(
            "title is empty for {}",
            item.natural_key
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    PublishedAt,
    CreatedAt,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone)]
pub struct RecordQuery {
    /// Exact topic match, case-insensitive.
    pub topic: Option<String>,
    pub sort: SortField,
    pub order: SortOrder,
    pub limit: usize,
}

impl Default for RecordQuery {
    fn default() -> Self {
        Self {
            topic: None,
            sort: SortField::default(),
            order: SortOrder::default(),
            limit: 20,
        }
    }
}

/// Sort in place. Records without a publish date always go last.
pub fn sort_records(records: &mut [StoredRecord], field: SortField, order: SortOrder) {
    records.sort_by(|a, b| {
        let primary = match field {
            SortField::PublishedAt => match (a.published_at, b.published_at) {
                (Some(x), Some(y)) => directed(x.cmp(&y), order),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            SortField::CreatedAt => directed(a.created_at.cmp(&b.created_at), order),
            SortField::Title => directed(
                a.title.to_lowercase().cmp(&b.title.to_lowercase()),
                order,
            ),
        };
        primary.then_with(|| a.natural_key.cmp(&b.natural_key))
    });
}

fn directed(ord: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ord,
        SortOrder::Desc => ord.reverse(),
    }
}

#[async_trait::async_trait]
pub trait Store: Send + Sync {
    async fn upsert(
        &self,
        item: &NormalizedItem,
        policy: UpdatePolicy,
    ) -> Result<UpsertOutcome, StoreError>;

    async fn get(&self, kind: SourceKind, key: &str) -> Result<Option<StoredRecord>, StoreError>;

    async fn list(
        &self,
        kind: SourceKind,
        query: &RecordQuery,
    ) -> Result<Vec<StoredRecord>, StoreError>;

    async fn count(&self, kind: SourceKind) -> Result<usize, StoreError>;

    /// Persist pending state. Stores without a durable layer do nothing.
    async fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(title: &str) -> NormalizedItem {
        let mut it = NormalizedItem::new(SourceKind::Video, "vid-1", title);
        it.description = Some("desc".into());
        it.topics = vec!["Robotics".into()];
        it
    }

    #[test]
    fn topics_only_policy_leaves_content_alone() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let mut rec = StoredRecord::from_item(&item("Old"), t0);

        let mut fresh = item("New");
        fresh.topics = vec!["AI Ethics".into()];
        assert!(rec.apply_update(&fresh, UpdatePolicy::TopicsOnly, t1));
        assert_eq!(rec.title, "Old");
        assert_eq!(rec.topics, vec!["AI Ethics".to_string()]);
        assert_eq!(rec.updated_at, t1);
        assert_eq!(rec.created_at, t0);
    }

    #[test]
    fn refresh_policy_rewrites_content_but_not_publish_date() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let mut original = item("Old");
        original.published_at = Some(t0);
        let mut rec = StoredRecord::from_item(&original, t0);

        let mut fresh = item("New");
        fresh.published_at = Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap());
        rec.apply_update(&fresh, UpdatePolicy::RefreshContent, t0);
        assert_eq!(rec.title, "New");
        assert_eq!(rec.published_at, Some(t0));
    }

    #[test]
    fn identical_update_is_a_no_op() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 5, 3, 0, 0, 0).unwrap();
        let mut rec = StoredRecord::from_item(&item("Same"), t0);
        assert!(!rec.apply_update(&item("Same"), UpdatePolicy::RefreshContent, t1));
        assert_eq!(rec.updated_at, t0);
    }

    #[test]
    fn published_sort_puts_missing_dates_last_both_ways() {
        let now = Utc::now();
        let mk = |key: &str, day: Option<u32>| {
            let mut it = NormalizedItem::new(SourceKind::News, key, key);
            it.published_at = day.map(|d| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap());
            StoredRecord::from_item(&it, now)
        };
        let mut recs = vec![mk("none", None), mk("old", Some(1)), mk("new", Some(9))];

        sort_records(&mut recs, SortField::PublishedAt, SortOrder::Desc);
        let keys: Vec<_> = recs.iter().map(|r| r.natural_key.as_str()).collect();
        assert_eq!(keys, vec!["new", "old", "none"]);

        sort_records(&mut recs, SortField::PublishedAt, SortOrder::Asc);
        let keys: Vec<_> = recs.iter().map(|r| r.natural_key.as_str()).collect();
        assert_eq!(keys, vec!["old", "new", "none"]);
    }

    #[test]
    fn validation_rejects_blank_key_and_title() {
        assert!(validate_item(&NormalizedItem::new(SourceKind::News, " ", "t")).is_err());
        assert!(validate_item(&NormalizedItem::new(SourceKind::News, "k", "")).is_err());
        assert!(validate_item(&NormalizedItem::new(SourceKind::News, "k", "t")).is_ok());
    }
}
