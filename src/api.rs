//! Read-only HTTP surface over the store.
//!
//! Routes are served both at the root and under `/api` (the path the web
//! frontend uses).

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio_cron_scheduler::JobScheduler;
use tower_http::cors::CorsLayer;

use crate::ingest::scheduler::{EntrySnapshot, ScheduleRegistry};
use crate::ingest::types::SourceKind;
use crate::store::{RecordQuery, SortField, SortOrder, Store, StoredRecord};

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub registry: Arc<ScheduleRegistry>,
    /// Running cron jobs. Owned here so they live exactly as long as the
    /// server; `None` when the API is served without ingestion.
    pub scheduler: Option<JobScheduler>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, registry: Arc<ScheduleRegistry>) -> Self {
        Self {
            store,
            registry,
            scheduler: None,
        }
    }

    pub fn with_scheduler(mut self, scheduler: JobScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }
}

pub fn router(state: AppState) -> Router {
    let routes: Router<AppState> = Router::new()
        .route("/health", get(health))
        .route("/news", get(list_news))
        .route("/videos", get(list_videos))
        .route("/schedule", get(schedule));

    Router::new()
        .merge(routes.clone())
        .nest("/api", routes)
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    topic: Option<String>,
    sort: Option<String>,
    order: Option<String>,
    limit: Option<usize>,
}

impl ListParams {
    fn into_query(self) -> Result<RecordQuery, ApiError> {
        let sort = match self.sort.as_deref().map(str::trim) {
            None | Some("") => SortField::default(),
            Some("published_at" | "publishedAt" | "date") => SortField::PublishedAt,
            Some("created_at" | "createdAt") => SortField::CreatedAt,
            Some("title") => SortField::Title,
            Some(other) => return Err(ApiError::bad_request(format!("unsupported sort `{other}`"))),
        };
        let order = match self.order.as_deref().map(|s| s.trim().to_ascii_lowercase()) {
            None => SortOrder::default(),
            Some(o) if o.is_empty() => SortOrder::default(),
            Some(o) if o == "asc" => SortOrder::Asc,
            Some(o) if o == "desc" => SortOrder::Desc,
            Some(o) => return Err(ApiError::bad_request(format!("unsupported order `{o}`"))),
        };
        let topic = self
            .topic
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Ok(RecordQuery {
            topic,
            sort,
            order,
            limit: self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        })
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let scheduler = if state.scheduler.is_some() { "running" } else { "off" };
    Json(json!({
        "status": "UP",
        "scheduler": scheduler,
        "timestamp": Utc::now().to_rfc3339()
    }))
}

async fn list_news(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<StoredRecord>>, ApiError> {
    list_kind(&state, SourceKind::News, params).await
}

async fn list_videos(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<StoredRecord>>, ApiError> {
    list_kind(&state, SourceKind::Video, params).await
}

async fn list_kind(
    state: &AppState,
    kind: SourceKind,
    params: ListParams,
) -> Result<Json<Vec<StoredRecord>>, ApiError> {
    let query = params.into_query()?;
    state.store.list(kind, &query).await.map(Json).map_err(|e| {
        tracing::error!(source = %kind, error = %e, "store query failed");
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("Failed to retrieve {kind} records from the store."),
        }
    })
}

async fn schedule(State(state): State<AppState>) -> Json<Vec<EntrySnapshot>> {
    Json(state.registry.snapshot())
}
