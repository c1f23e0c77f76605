// vellumd: content-intake webhook receiver entry point.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::info;

use vellum_server::api::{build_router, AppState};
use vellum_server::config::ServerConfig;
use vellum_server::ingest::IngestPipeline;
use vellum_server::store::Db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match std::env::var("VELLUM_CONFIG") {
        Ok(path) => ServerConfig::load_from(Path::new(&path))
            .with_context(|| format!("failed to load config from `{path}`"))?,
        Err(_) => ServerConfig::load(),
    };

    let db = Db::open(&config.db_path)
        .with_context(|| format!("failed to open database at `{}`", config.db_path.display()))?;
    let pipeline = IngestPipeline::new(config.media.clone(), &config.fetch)
        .context("failed to build ingestion pipeline")?;

    let state = AppState { db: Arc::new(Mutex::new(db)), pipeline };
    let app = build_router(state, &config.media);

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", config.listen_addr))?;

    info!(listen_addr = %config.listen_addr, "starting vellum server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("vellum server exited unexpectedly")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}
