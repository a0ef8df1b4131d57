// src/ingest/providers/news_api.rs
//! NewsAPI `/v2/everything` adapter: one request per cycle.

use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::NewsConfig;
use crate::error::FetchError;
use crate::ingest::clean_text;
use crate::ingest::providers::{non_blank, parse_timestamp, report_fetch_error, truncate_body};
use crate::ingest::types::{NormalizedItem, SourceAdapter, SourceKind};

/// Upper bound NewsAPI is asked for per call.
pub const MAX_PAGE_SIZE: u32 = 50;

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    status: String,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiArticle {
    source: Option<NewsApiSource>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    url_to_image: Option<String>,
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsApiSource {
    name: Option<String>,
}

pub struct NewsApiAdapter {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    query: String,
    language: String,
    sort_by: String,
    page_size: u32,
    domains: Vec<String>,
    timeout: Duration,
}

impl NewsApiAdapter {
    pub fn new(
        http: reqwest::Client,
        cfg: &NewsConfig,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            endpoint: cfg.endpoint.clone(),
            api_key,
            query: cfg.query.clone(),
            language: cfg.language.clone(),
            sort_by: cfg.sort_by.clone(),
            page_size: cfg.page_size.clamp(1, MAX_PAGE_SIZE),
            domains: cfg.domains.clone(),
            timeout,
        }
    }

    /// Single fetch with the failure kept as a typed error.
    pub async fn try_fetch(&self) -> Result<Vec<NormalizedItem>, FetchError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(FetchError::NotConfigured("NEWS_API_KEY".into()));
        };

        let mut params: Vec<(&str, String)> = vec![
            ("q", self.query.clone()),
            ("language", self.language.clone()),
            ("sortBy", self.sort_by.clone()),
            ("pageSize", self.page_size.to_string()),
        ];
        if !self.domains.is_empty() {
            params.push(("domains", self.domains.join(",")));
        }

        let resp = self
            .http
            .get(&self.endpoint)
            .header("X-Api-Key", api_key)
            .query(&params)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::QuotaExceeded(truncate_body(&body)));
        }

        let parsed: NewsApiResponse = match serde_json::from_str(&body) {
            Ok(p) => p,
            Err(_) if !status.is_success() => {
                return Err(FetchError::Status {
                    status: status.as_u16(),
                    body: truncate_body(&body),
                })
            }
            Err(e) => return Err(FetchError::Malformed(e.to_string())),
        };

        if parsed.status != "ok" {
            let code = parsed.code.unwrap_or_else(|| parsed.status.clone());
            let message = parsed.message.unwrap_or_default();
            if code == "rateLimited" {
                return Err(FetchError::QuotaExceeded(message));
            }
            return Err(FetchError::Upstream { code, message });
        }

        let raw = parsed.articles.len();
        let items: Vec<NormalizedItem> = parsed
            .articles
            .into_iter()
            .filter_map(normalize_article)
            .collect();

        tracing::debug!(raw, kept = items.len(), "news articles normalized");
        counter!("ingest_events_total", "source" => "news").increment(raw as u64);
        Ok(items)
    }
}

/// Map one NewsAPI article; drops it when url or title is missing.
fn normalize_article(a: NewsApiArticle) -> Option<NormalizedItem> {
    let url = non_blank(a.url)?;
    let title = a.title.as_deref().map(clean_text).filter(|t| !t.is_empty())?;

    let mut item = NormalizedItem::new(SourceKind::News, url, title);
    item.description = a
        .description
        .as_deref()
        .map(clean_text)
        .filter(|d| !d.is_empty());
    item.published_at = a.published_at.as_deref().and_then(parse_timestamp);
    item.source_label = non_blank(a.source.and_then(|s| s.name));
    item.media_url = non_blank(a.url_to_image);
    Some(item)
}

#[async_trait]
impl SourceAdapter for NewsApiAdapter {
    async fn fetch_batch(&self) -> Vec<NormalizedItem> {
        match self.try_fetch().await {
            Ok(items) => {
                tracing::info!(source = "news", items = items.len(), "fetched news batch");
                items
            }
            Err(e) => {
                report_fetch_error("news", "everything", &e);
                Vec::new()
            }
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::News
    }

    fn name(&self) -> &'static str {
        "newsapi"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(url: Option<&str>, title: Option<&str>) -> NewsApiArticle {
        NewsApiArticle {
            source: Some(NewsApiSource {
                name: Some("Wired".into()),
            }),
            title: title.map(Into::into),
            description: Some("<p>Some &amp; text</p>".into()),
            url: url.map(Into::into),
            url_to_image: Some("".into()),
            published_at: Some("2024-05-01T10:00:00Z".into()),
        }
    }

    #[test]
    fn article_without_url_or_title_is_dropped() {
        assert!(normalize_article(article(None, Some("t"))).is_none());
        assert!(normalize_article(article(Some("  "), Some("t"))).is_none());
        assert!(normalize_article(article(Some("https://w.test/a"), None)).is_none());
    }

    #[test]
    fn article_fields_are_cleaned() {
        let it = normalize_article(article(Some("https://w.test/a"), Some("  Big  news "))).unwrap();
        assert_eq!(it.natural_key, "https://w.test/a");
        assert_eq!(it.title, "Big news");
        assert_eq!(it.description.as_deref(), Some("Some & text"));
        assert_eq!(it.source_label.as_deref(), Some("Wired"));
        assert!(it.media_url.is_none());
        assert!(it.published_at.is_some());
        assert!(it.topics.is_empty());
    }
}
