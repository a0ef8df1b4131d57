// tests/ingest_e2e.rs
//! Full cycle against mocked NewsAPI and Hugging Face endpoints.
use std::sync::Arc;

use httpmock::prelude::*;
use serde_json::json;

use aiverse::bootstrap::{build_orchestrator, http_client};
use aiverse::config::{AppConfig, Secrets};
use aiverse::ingest::types::SourceKind;
use aiverse::store::{MemoryStore, Store};

fn config(server: &MockServer) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.news.endpoint = server.url("/v2/everything");
    cfg.youtube.enabled = false;
    cfg.classifier.endpoint = server.url("/models/facebook/bart-large-mnli");
    cfg.store.snapshot_path = None;
    cfg.secrets = Secrets {
        news_api_key: Some("news-key".into()),
        youtube_api_key: None,
        hf_api_token: Some("hf-token".into()),
    };
    cfg
}

async fn mock_upstreams(server: &MockServer) {
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v2/everything");
            then.status(200).json_body(json!({
                "status": "ok",
                "articles": [
                    {
                        "source": {"name": "The Verge"},
                        "title": "New image model released",
                        "description": "It renders photorealistic scenes from text prompts.",
                        "url": "https://verge.test/image-model",
                        "publishedAt": "2024-05-01T10:00:00Z"
                    },
                    {
                        "source": {"name": "Ars Technica"},
                        "title": "Chip export rules tighten",
                        "description": "Regulators publish a new list of restricted accelerators.",
                        "url": "https://ars.test/chips",
                        "publishedAt": "2024-05-01T09:00:00Z"
                    }
                ]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/models/facebook/bart-large-mnli")
                .body_contains("New image model released");
            then.status(200).json_body(json!({
                "labels": ["Generative AI", "Computer Vision", "Robotics"],
                "scores": [0.92, 0.55, 0.03]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/models/facebook/bart-large-mnli")
                .body_contains("Chip export rules tighten");
            then.status(200).json_body(json!({
                "labels": ["AI Hardware", "AI Regulation"],
                "scores": [0.64, 0.41]
            }));
        })
        .await;
}

#[tokio::test]
async fn news_cycle_fetches_tags_and_stores() {
    let server = MockServer::start_async().await;
    mock_upstreams(&server).await;

    let store = Arc::new(MemoryStore::new());
    let orch = build_orchestrator(&config(&server), http_client().unwrap(), store.clone());
    assert_eq!(orch.sources(), vec![SourceKind::News]);

    let r = orch.run_cycle(SourceKind::News).await;
    assert_eq!((r.fetched_count, r.saved_count, r.failed_count), (2, 2, 0));

    let tagged = store
        .get(SourceKind::News, "https://verge.test/image-model")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tagged.topics, vec!["Generative AI".to_string()]);
    assert_eq!(tagged.source_label.as_deref(), Some("The Verge"));

    let untagged = store
        .get(SourceKind::News, "https://ars.test/chips")
        .await
        .unwrap()
        .unwrap();
    assert!(untagged.topics.is_empty());

    // Same upstream content again: nothing new, nothing lost.
    let again = orch.run_cycle(SourceKind::News).await;
    assert_eq!((again.created_count, again.updated_count), (0, 2));
    assert_eq!(store.count(SourceKind::News).await.unwrap(), 2);
}

#[tokio::test]
async fn snapshot_survives_a_restart() {
    let server = MockServer::start_async().await;
    mock_upstreams(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");

    {
        let store = Arc::new(MemoryStore::open(&path).await.unwrap());
        let orch = build_orchestrator(&config(&server), http_client().unwrap(), store);
        orch.run_cycle(SourceKind::News).await;
    }
    assert!(path.exists());

    let reopened = MemoryStore::open(&path).await.unwrap();
    assert_eq!(reopened.count(SourceKind::News).await.unwrap(), 2);
    let rec = reopened
        .get(SourceKind::News, "https://verge.test/image-model")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rec.topics, vec!["Generative AI".to_string()]);
}
