// src/config/classifier.rs
use serde::{Deserialize, Serialize};

pub const DEFAULT_CLASSIFIER_ENDPOINT: &str =
    "https://api-inference.huggingface.co/models/facebook/bart-large-mnli";

/// Candidate topics every item is scored against.
pub const DEFAULT_TOPIC_LABELS: [&str; 10] = [
    "Large Language Models",
    "Computer Vision",
    "AI Ethics",
    "Reinforcement Learning",
    "AI Hardware",
    "Generative AI",
    "Robotics",
    "AI Regulation",
    "Machine Learning Research",
    "Natural Language Processing",
];

fn default_threshold() -> f64 {
    0.7
}
fn default_min_chars() -> usize {
    25
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Zero-shot inference endpoint.
    pub endpoint: String,
    pub labels: Vec<String>,
    /// Minimum per-label score (inclusive) for a label to be assigned.
    pub threshold: f64,
    /// Inputs shorter than this (trimmed, in chars) are not sent.
    pub min_chars: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_CLASSIFIER_ENDPOINT.to_string(),
            labels: DEFAULT_TOPIC_LABELS.iter().map(|s| s.to_string()).collect(),
            threshold: default_threshold(),
            min_chars: default_min_chars(),
        }
    }
}

impl ClassifierConfig {
    pub(crate) fn sanitize(&mut self) {
        if !(0.0..=1.0).contains(&self.threshold) || self.threshold.is_nan() {
            self.threshold = default_threshold();
        }
        let mut seen = std::collections::HashSet::new();
        self.labels = std::mem::take(&mut self.labels)
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty() && seen.insert(l.clone()))
            .collect();
    }
}
