use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use script_runner::engine::{BoaEngine, ScriptEngine};
use script_runner::runner::ExecutionOrchestrator;
use script_runner::server::{self, AppState};
use script_runner::config;
use script_runner::languages::LanguageCatalog;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("script_runner=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    info!("Starting Script Runner...");

    config::init_config()?;
    let config = config::get_config();
    info!(
        "Server config: addr={}, max_concurrent_executions={}",
        config.bind_addr, config.max_concurrent_executions
    );

    let engine: Arc<dyn ScriptEngine> = Arc::new(BoaEngine::new());
    info!("Engine: {} {}", engine.name(), engine.version());

    let catalog = Arc::new(LanguageCatalog::load(
        config.languages_config.as_deref(),
        engine.as_ref(),
    )?);
    match &config.languages_config {
        Some(path) => info!("Loaded language catalog from {}", path.display()),
        None => info!("Loaded embedded language catalog"),
    }
    info!("Available languages: {}", catalog.languages().join(", "));

    let orchestrator =
        ExecutionOrchestrator::new(engine, catalog, config.max_concurrent_executions);

    server::start_server(&config.bind_addr, AppState::new(Arc::new(orchestrator))).await
}
