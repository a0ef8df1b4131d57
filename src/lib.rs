// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod analyze;
pub mod api;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::bootstrap::Runtime;
pub use crate::config::AppConfig;
pub use crate::ingest::types::{NormalizedItem, SourceAdapter, SourceKind};
pub use crate::ingest::{IngestionResult, Orchestrator};
pub use crate::store::{MemoryStore, Store};
