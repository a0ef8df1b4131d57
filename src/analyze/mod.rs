// src/analyze/mod.rs
//! Enrichment applied to fetched items before they are stored.

pub mod topics;

pub use crate::analyze::topics::{
    build_classifier, select_labels, DisabledClassifier, DynClassifier, HuggingFaceClassifier,
    TopicClassifier,
};
