use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use gwo_core::JsonFileSource;
use gwo_engine::{EngineConfig, WorkforceEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("GWO_CONFIG").ok();
    let config = match &config_path {
        Some(path) => EngineConfig::load(Path::new(path))?,
        None => EngineConfig::default(),
    };

    gwo_observability::init(&config.logging);
    if config_path.is_none() {
        tracing::warn!("GWO_CONFIG not set; using built-in defaults");
    }

    let data_path = std::env::var("GWO_DATA")
        .ok()
        .map(PathBuf::from)
        .or_else(|| config.server.data_path.clone());
    let engine = match data_path {
        Some(path) => {
            let source = JsonFileSource::new(&path);
            WorkforceEngine::from_source(&config, &source)
                .with_context(|| format!("failed to load records from {}", path.display()))?
        }
        None => {
            tracing::warn!("GWO_DATA not set; starting with an empty record set");
            WorkforceEngine::empty(&config).context("failed to build engine")?
        }
    };
    let engine = Arc::new(engine);

    let app = gwo_api::app::build_app(
        Arc::clone(&engine),
        Duration::from_millis(config.server.request_timeout_ms),
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    engine.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
