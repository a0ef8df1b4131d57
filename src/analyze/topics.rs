//! Topic tagging via a zero-shot classification endpoint.
//!
//! Classification is best-effort: a missing token, a short input, or any
//! transport/service failure yields an empty topic list. Nothing here ever
//! returns an error to the pipeline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::config::ClassifierConfig;
use crate::error::ClassifyError;
use crate::ingest::providers::truncate_body;

/// Characters of input echoed into logs.
const PREVIEW_CHARS: usize = 70;

#[async_trait]
pub trait TopicClassifier: Send + Sync {
    /// Labels (in service order) scoring at or above `threshold`.
    async fn classify(&self, text: &str, labels: &[String], threshold: f64) -> Vec<String>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynClassifier = Arc<dyn TopicClassifier>;

/// Used when no credential is configured.
pub struct DisabledClassifier;

#[async_trait]
impl TopicClassifier for DisabledClassifier {
    async fn classify(&self, _text: &str, _labels: &[String], _threshold: f64) -> Vec<String> {
        Vec::new()
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Keep every label whose parallel score meets the threshold (inclusive).
pub fn select_labels(labels: &[String], scores: &[f64], threshold: f64) -> Vec<String> {
    labels
        .iter()
        .zip(scores.iter())
        .filter(|(_, score)| **score >= threshold)
        .map(|(label, _)| label.clone())
        .collect()
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}

#[derive(Serialize)]
struct ZeroShotRequest<'a> {
    inputs: &'a str,
    parameters: ZeroShotParameters<'a>,
}

#[derive(Serialize)]
struct ZeroShotParameters<'a> {
    candidate_labels: &'a [String],
    multi_label: bool,
}

#[derive(Debug, Deserialize)]
struct ZeroShotOutput {
    labels: Vec<String>,
    scores: Vec<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ZeroShotResponse {
    Single(ZeroShotOutput),
    Batch(Vec<ZeroShotOutput>),
}

/// Hugging Face inference API (`facebook/bart-large-mnli` by default).
pub struct HuggingFaceClassifier {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    min_chars: usize,
    timeout: Duration,
}

impl HuggingFaceClassifier {
    pub fn new(
        http: reqwest::Client,
        cfg: &ClassifierConfig,
        token: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            endpoint: cfg.endpoint.clone(),
            token,
            min_chars: cfg.min_chars,
            timeout,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    /// Same as [`TopicClassifier::classify`] but keeps the failure.
    pub async fn try_classify(
        &self,
        text: &str,
        labels: &[String],
        threshold: f64,
    ) -> Result<Vec<String>, ClassifyError> {
        let Some(token) = self.token.as_deref() else {
            return Err(ClassifyError::NotConfigured);
        };
        if labels.is_empty() || text.trim().chars().count() < self.min_chars {
            return Ok(Vec::new());
        }

        let req = ZeroShotRequest {
            inputs: text,
            parameters: ZeroShotParameters {
                candidate_labels: labels,
                multi_label: true,
            },
        };
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&req)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClassifyError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let output = match resp.json::<ZeroShotResponse>().await? {
            ZeroShotResponse::Single(o) => o,
            ZeroShotResponse::Batch(mut v) if !v.is_empty() => v.swap_remove(0),
            ZeroShotResponse::Batch(_) => {
                return Err(ClassifyError::Malformed("empty batch response".into()))
            }
        };
        if output.labels.len() != output.scores.len() {
            return Err(ClassifyError::Malformed(format!(
                "{} labels vs {} scores",
                output.labels.len(),
                output.scores.len()
            )));
        }

        Ok(select_labels(&output.labels, &output.scores, threshold))
    }
}

#[async_trait]
impl TopicClassifier for HuggingFaceClassifier {
    async fn classify(&self, text: &str, labels: &[String], threshold: f64) -> Vec<String> {
        match self.try_classify(text, labels, threshold).await {
            Ok(topics) => {
                tracing::debug!(input = %preview(text), topics = ?topics, "topics assigned");
                topics
            }
            Err(ClassifyError::NotConfigured) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, input = %preview(text), "topic classification failed");
                counter!("ingest_classify_errors_total").increment(1);
                Vec::new()
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "huggingface"
    }
}

/// Pick the real client when a token exists, otherwise a no-op.
pub fn build_classifier(
    http: reqwest::Client,
    cfg: &ClassifierConfig,
    token: Option<String>,
    timeout: Duration,
) -> DynClassifier {
    if token.is_none() {
        tracing::warn!("HF_API_TOKEN not set, topic tagging disabled");
        return Arc::new(DisabledClassifier);
    }
    Arc::new(HuggingFaceClassifier::new(http, cfg, token, timeout))
}
