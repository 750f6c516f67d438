//! Financial News Sentiment Server
//!
//! Serves a fine-tuned checkpoint over HTTP with `GET /health` and
//! `POST /analyze`.

mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::state::{AppState, ModelSlot, ServerConfig};

/// Financial News Sentiment Server
#[derive(Parser, Debug)]
#[command(name = "finsent-server")]
#[command(version)]
#[command(about = "HTTP API serving the fine-tuned sentiment classifier")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value = "8000", env = "FINSENT_PORT")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0", env = "FINSENT_HOST")]
    host: String,

    /// Checkpoint directory written by finsent-train
    #[arg(long, default_value = "model", env = "FINSENT_CHECKPOINT_DIR")]
    checkpoint_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
        checkpoint_dir: cli.checkpoint_dir,
    };

    info!("Financial News Sentiment Server v{}", env!("CARGO_PKG_VERSION"));
    info!("  Checkpoint dir: {:?}", config.checkpoint_dir);

    let load_config = config.clone();
    let state = tokio::task::spawn_blocking(move || AppState::load(&load_config)).await?;
    info!("  Device: {}", state.device);
    if let ModelSlot::NotLoaded { reason } = &state.model {
        warn!("Serving without a model: {}", reason);
    }

    let app = routes::router(Arc::new(state));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
