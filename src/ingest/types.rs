// src/ingest/types.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which upstream a cycle pulls from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    News,
    #[serde(rename = "youtube", alias = "video", alias = "videos")]
    Video,
}

impl SourceKind {
    pub const ALL: [SourceKind; 2] = [SourceKind::News, SourceKind::Video];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::News => "news",
            SourceKind::Video => "youtube",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "news" => Ok(SourceKind::News),
            "youtube" | "video" | "videos" => Ok(SourceKind::Video),
            other => Err(format!("unknown source `{other}` (expected news|youtube)")),
        }
    }
}

/// One fetched item in the shape every adapter produces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedItem {
    /// Canonical article URL or platform video id.
    pub natural_key: String,
    pub kind: SourceKind,
    pub title: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Publisher name or channel title.
    pub source_label: Option<String>,
    /// Article image or video thumbnail.
    pub media_url: Option<String>,
    pub channel_id: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}

impl NormalizedItem {
    pub fn new(kind: SourceKind, natural_key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            natural_key: natural_key.into(),
            kind,
            title: title.into(),
            description: None,
            published_at: None,
            source_label: None,
            media_url: None,
            channel_id: None,
            topics: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Text sent to the classifier: `title. description`, or the title alone.
    pub fn classification_text(&self) -> String {
        match self.description.as_deref().map(str::trim) {
            Some(desc) if !desc.is_empty() => format!("{}. {}", self.title, desc),
            _ => self.title.clone(),
        }
    }
}

/// Capability shared by every content source.
///
/// `fetch_batch` never fails: upstream problems are logged inside the adapter
/// and surface as an empty (or partial) batch.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch_batch(&self) -> Vec<NormalizedItem>;
    fn kind(&self) -> SourceKind;
    fn name(&self) -> &'static str;

    /// Sequential upstream calls one `fetch_batch` makes. The orchestrator
    /// allows one fetch timeout per call for the whole batch.
    fn calls_per_batch(&self) -> u32 {
        1
    }
}
