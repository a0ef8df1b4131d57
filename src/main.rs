//! aiverse ingestion service: binary entrypoint.
//! Boots the scheduled ingestion jobs and the Axum read API.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;

use aiverse::api::{self, AppState};
use aiverse::bootstrap::Runtime;
use aiverse::config::AppConfig;
use aiverse::ingest::ensure_metrics_described;
use aiverse::logging::init_tracing;
use aiverse::metrics::Metrics;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default().context("loading ingest config")?;

    let metrics = match Metrics::init() {
        Ok(m) => {
            ensure_metrics_described();
            Some(m)
        }
        Err(e) => {
            tracing::warn!(error = %e, "prometheus recorder not installed; /metrics disabled");
            None
        }
    };

    let runtime = Runtime::from_config(cfg).await?;
    let scheduler = runtime.start_scheduler().await?;

    let state = AppState::new(runtime.store.clone(), runtime.registry.clone())
        .with_scheduler(scheduler);
    let mut router = api::router(state);
    if let Some(m) = metrics.as_ref() {
        router = router.merge(m.router());
    }

    Ok(router.into())
}
