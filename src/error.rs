// src/error.rs
//! Error taxonomy for the ingestion pipeline.
//!
//! Every variant here is recovered at the boundary that produces it (adapter,
//! classifier, per-item upsert) and turned into data: an empty batch, an empty
//! topic set, or an entry in the cycle's error list.

use thiserror::Error;

/// Failure while pulling a batch from an upstream content API.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Credential for the source is missing; the fetch is skipped.
    #[error("source is not configured: {0}")]
    NotConfigured(String),

    #[error("network error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed payload: {0}")]
    Malformed(String),

    /// Upstream answered with its own error envelope (e.g. NewsAPI `status: "error"`).
    #[error("upstream error {code}: {message}")]
    Upstream { code: String, message: String },

    /// Quota or rate limit exhausted; handled like any transient error but logged apart.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
}

impl FetchError {
    pub fn is_quota(&self) -> bool {
        matches!(self, FetchError::QuotaExceeded(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() {
            FetchError::Malformed(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Failure while calling the zero-shot classifier.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("classifier is not configured")]
    NotConfigured,

    #[error("network error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("classifier returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed classifier response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ClassifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClassifyError::Timeout
        } else if err.is_decode() {
            ClassifyError::Malformed(err.to_string())
        } else {
            ClassifyError::Transport(err.to_string())
        }
    }
}

/// Failure of a single upsert (or a snapshot flush) at the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("constraint violation: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out")]
    Timeout,

    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Invalid or unreadable configuration detected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("config path {0} does not exist")]
    MissingFile(String),

    #[error("unknown timezone `{0}`")]
    InvalidTimezone(String),

    #[error("invalid cadence `{cadence}` for source {source_name}: {reason}")]
    InvalidCadence {
        source_name: String,
        cadence: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_is_distinguished_from_transient_errors() {
        assert!(FetchError::QuotaExceeded("daily".into()).is_quota());
        assert!(!FetchError::Timeout.is_quota());
        assert!(!FetchError::Status {
            status: 500,
            body: String::new()
        }
        .is_quota());
    }
}
