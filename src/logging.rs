//! Tracing setup shared by the service and the one-shot binary.
//!
//! - Respects `RUST_LOG` for filtering (defaults to `info`).
//! - `LOG_FORMAT=json` switches stdout to JSON lines for log shippers;
//!   anything else gives the compact human format.
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

/// Install the global subscriber. Safe to call twice; the second call is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init()
    } else {
        registry
            .with(fmt::layer().compact().with_target(true))
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
