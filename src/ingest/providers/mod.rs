// src/ingest/providers/mod.rs
pub mod news_api;
pub mod youtube;

use chrono::{DateTime, Utc};
use metrics::counter;

use crate::error::FetchError;

/// Parse an RFC 3339 timestamp; anything unparsable becomes `None`.
pub(crate) fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Keep error bodies short enough for a log line.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 300;
    if body.chars().count() > MAX {
        let mut s: String = body.chars().take(MAX).collect();
        s.push_str("...");
        s
    } else {
        body.to_string()
    }
}

/// Non-empty, trimmed string or `None`.
pub(crate) fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Log a fetch failure at the adapter boundary. Quota exhaustion gets its own
/// line and counter so operators can tell it apart from transient errors.
pub(crate) fn report_fetch_error(source: &'static str, scope: &str, err: &FetchError) {
    match err {
        FetchError::NotConfigured(what) => {
            tracing::warn!(source, scope, missing = %what, "source not configured, skipping fetch");
        }
        FetchError::QuotaExceeded(detail) => {
            tracing::error!(source, scope, detail = %detail, "upstream quota exceeded");
            counter!("ingest_quota_exceeded_total", "source" => source).increment(1);
            counter!("ingest_provider_errors_total", "source" => source).increment(1);
        }
        other => {
            tracing::warn!(source, scope, error = %other, "provider fetch failed");
            counter!("ingest_provider_errors_total", "source" => source).increment(1);
        }
    }
}
