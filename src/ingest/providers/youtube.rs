// src/ingest/providers/youtube.rs
//! YouTube Data API `search` adapter: one request per configured channel.

use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::YouTubeConfig;
use crate::error::FetchError;
use crate::ingest::clean_text;
use crate::ingest::providers::{non_blank, parse_timestamp, report_fetch_error, truncate_body};
use crate::ingest::types::{NormalizedItem, SourceAdapter, SourceKind};

pub const MAX_RESULTS_PER_CHANNEL: u32 = 10;

/// Error reasons Google uses for exhausted quota / rate limits.
const QUOTA_REASONS: [&str; 3] = ["quotaExceeded", "dailyLimitExceeded", "rateLimitExceeded"];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: Option<SearchId>,
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchId {
    kind: Option<String>,
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    published_at: Option<String>,
    channel_id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    channel_title: Option<String>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Thumbnails {
    pub default: Option<Thumbnail>,
    pub medium: Option<Thumbnail>,
    pub high: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Thumbnail {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    reason: Option<String>,
}

/// Medium, then high, then default; first non-empty URL wins.
pub(crate) fn pick_thumbnail(thumbs: &Thumbnails) -> Option<String> {
    [&thumbs.medium, &thumbs.high, &thumbs.default]
        .into_iter()
        .find_map(|t| {
            t.as_ref()
                .and_then(|t| t.url.as_deref())
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string)
        })
}

/// Result of walking every channel once.
#[derive(Debug, Default)]
pub struct ChannelFold {
    pub items: Vec<NormalizedItem>,
    pub failures: Vec<(String, FetchError)>,
    /// Channels not requested because quota was already exhausted.
    pub skipped: Vec<String>,
}

impl ChannelFold {
    fn absorb(mut self, channel: &str, outcome: Result<Vec<NormalizedItem>, FetchError>) -> Self {
        match outcome {
            Ok(mut items) => self.items.append(&mut items),
            Err(e) => self.failures.push((channel.to_string(), e)),
        }
        self
    }

    pub fn quota_hit(&self) -> bool {
        self.failures.iter().any(|(_, e)| e.is_quota())
    }
}

pub struct YouTubeAdapter {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    channels: Vec<String>,
    max_results: u32,
    stop_on_quota: bool,
    timeout: Duration,
}

impl YouTubeAdapter {
    pub fn new(
        http: reqwest::Client,
        cfg: &YouTubeConfig,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            endpoint: cfg.endpoint.clone(),
            api_key,
            channels: cfg.channel_ids.clone(),
            max_results: cfg.max_results.clamp(1, MAX_RESULTS_PER_CHANNEL),
            stop_on_quota: cfg.stop_on_quota,
            timeout,
        }
    }

    /// Fetch every channel sequentially; one channel failing never stops the rest
    /// (unless `stop_on_quota` is set and the failure was a quota signal).
    pub async fn fetch_all(&self) -> ChannelFold {
        let mut acc = ChannelFold::default();
        for channel in &self.channels {
            if self.stop_on_quota && acc.quota_hit() {
                acc.skipped.push(channel.clone());
                continue;
            }
            let outcome = self.fetch_channel(channel).await;
            acc = acc.absorb(channel, outcome);
        }
        acc
    }

    pub async fn fetch_channel(&self, channel_id: &str) -> Result<Vec<NormalizedItem>, FetchError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(FetchError::NotConfigured("YOUTUBE_API_KEY".into()));
        };

        let max_results = self.max_results.to_string();
        let resp = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("part", "snippet"),
                ("channelId", channel_id),
                ("maxResults", max_results.as_str()),
                ("order", "date"),
                ("type", "video"),
                ("key", api_key),
            ])
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(classify_error_body(status, &body));
        }

        let parsed: SearchResponse =
            serde_json::from_str(&body).map_err(|e| FetchError::Malformed(e.to_string()))?;
        let raw = parsed.items.len();
        let items: Vec<NormalizedItem> = parsed.items.into_iter().filter_map(normalize_video).collect();

        tracing::debug!(channel = channel_id, raw, kept = items.len(), "channel videos normalized");
        counter!("ingest_events_total", "source" => "youtube").increment(raw as u64);
        Ok(items)
    }
}

/// Turn a non-2xx response into a typed error, spotting quota reasons.
fn classify_error_body(status: StatusCode, body: &str) -> FetchError {
    if let Ok(env) = serde_json::from_str::<ErrorEnvelope>(body) {
        let quota_reason = env
            .error
            .errors
            .iter()
            .filter_map(|d| d.reason.as_deref())
            .find(|r| QUOTA_REASONS.contains(r));
        if let Some(reason) = quota_reason {
            let message = env.error.message.unwrap_or_default();
            return FetchError::QuotaExceeded(format!("{reason}: {message}"));
        }
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return FetchError::QuotaExceeded(truncate_body(body));
    }
    FetchError::Status {
        status: status.as_u16(),
        body: truncate_body(body),
    }
}

fn normalize_video(item: SearchItem) -> Option<NormalizedItem> {
    let id = item.id?;
    if id.kind.as_deref() != Some("youtube#video") {
        return None;
    }
    let video_id = non_blank(id.video_id)?;
    let snippet = item.snippet?;
    let title = snippet
        .title
        .as_deref()
        .map(clean_text)
        .filter(|t| !t.is_empty())?;

    let mut out = NormalizedItem::new(SourceKind::Video, video_id, title);
    out.description = snippet
        .description
        .as_deref()
        .map(clean_text)
        .filter(|d| !d.is_empty());
    out.published_at = snippet.published_at.as_deref().and_then(parse_timestamp);
    out.source_label = non_blank(snippet.channel_title);
    out.channel_id = non_blank(snippet.channel_id);
    out.media_url = pick_thumbnail(&snippet.thumbnails);
    Some(out)
}

#[async_trait]
impl SourceAdapter for YouTubeAdapter {
    async fn fetch_batch(&self) -> Vec<NormalizedItem> {
        if self.api_key.is_none() {
            report_fetch_error(
                "youtube",
                "all-channels",
                &FetchError::NotConfigured("YOUTUBE_API_KEY".into()),
            );
            return Vec::new();
        }

        let fold = self.fetch_all().await;
        for (channel, err) in &fold.failures {
            report_fetch_error("youtube", channel, err);
        }
        if !fold.skipped.is_empty() {
            tracing::warn!(
                source = "youtube",
                skipped = fold.skipped.len(),
                "quota exhausted, remaining channels skipped this cycle"
            );
        }
        tracing::info!(
            source = "youtube",
            channels = self.channels.len(),
            failed_channels = fold.failures.len(),
            items = fold.items.len(),
            "fetched video batch"
        );
        fold.items
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Video
    }

    fn name(&self) -> &'static str {
        "youtube"
    }

    fn calls_per_batch(&self) -> u32 {
        u32::try_from(self.channels.len()).unwrap_or(u32::MAX).max(1)
    }
}
