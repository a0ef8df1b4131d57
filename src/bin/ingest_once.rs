//! Run a single ingestion cycle outside the scheduler and print the result as JSON.
//!
//! Usage: `ingest-once [news|youtube|all]` (default: all enabled sources).

use aiverse::bootstrap::Runtime;
use aiverse::config::AppConfig;
use aiverse::ingest::types::SourceKind;
use aiverse::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let arg = std::env::args().nth(1).unwrap_or_else(|| "all".to_string());
    let cfg = AppConfig::load_default()?;
    let rt = Runtime::from_config(cfg).await?;

    let sources = if arg.eq_ignore_ascii_case("all") {
        rt.orchestrator.sources()
    } else {
        let kind: SourceKind = arg.parse().map_err(anyhow::Error::msg)?;
        vec![kind]
    };

    let mut results = Vec::with_capacity(sources.len());
    for source in sources {
        results.push(rt.orchestrator.run_cycle(source).await);
    }

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
