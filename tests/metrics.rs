// tests/metrics.rs
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{self, Body};
use http::{Request, StatusCode};
use tower::ServiceExt;

use aiverse::analyze::DisabledClassifier;
use aiverse::ingest::types::{NormalizedItem, SourceAdapter, SourceKind};
use aiverse::ingest::{ensure_metrics_described, Orchestrator, SourceSettings};
use aiverse::metrics::Metrics;
use aiverse::store::MemoryStore;

struct OneItem;

#[async_trait]
impl SourceAdapter for OneItem {
    async fn fetch_batch(&self) -> Vec<NormalizedItem> {
        vec![NormalizedItem::new(SourceKind::Video, "vid-9", "Robot dog learns stairs")]
    }
    fn kind(&self) -> SourceKind {
        SourceKind::Video
    }
    fn name(&self) -> &'static str {
        "one-item"
    }
}

#[tokio::test]
async fn metrics_endpoint_exposes_cycle_series() {
    let metrics = Metrics::init().expect("recorder installs once per test binary");
    ensure_metrics_described();

    let orch = Orchestrator::new(
        Arc::new(DisabledClassifier),
        Arc::new(MemoryStore::new()),
        Vec::new(),
        0.7,
    )
    .with_source(Arc::new(OneItem), SourceSettings::default());
    let r = orch.run_cycle(SourceKind::Video).await;
    assert_eq!(r.saved_count, 1);

    let req = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .expect("failed to build request");
    let resp = metrics.router().oneshot(req).await.expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("ingest_saved_total"), "{text}");
    assert!(text.contains(r#"source="youtube""#), "{text}");
    assert!(text.contains("ingest_pipeline_last_run_ts"), "{text}");
}
