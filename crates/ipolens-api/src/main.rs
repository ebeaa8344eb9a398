use anyhow::Context;
use ipolens_ai::{GeminiProvider, SynthesisEngine};
use ipolens_api::{AppState, Server};
use ipolens_core::ConfigManager;
use ipolens_store::SqliteStore;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ipolens=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ConfigManager::new()?;
    let settings = config.settings();

    if let Some(parent) = Path::new(&settings.database.path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create data directory {parent:?}"))?;
        }
    }
    let store = Arc::new(SqliteStore::open(&settings.database.path)?);

    // A missing API key fails here, at startup, not on the first request.
    let provider = Arc::new(GeminiProvider::new(settings.gemini.clone())?);
    let engine = Arc::new(SynthesisEngine::new(provider));

    let state = AppState::new(store, engine, settings.auth.clone());

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid server address {}:{}",
                settings.server.host, settings.server.port
            )
        })?;

    Server::new(addr, state).run().await?;
    Ok(())
}
