//! Document QA server binary
//!
//! Run with: cargo run -p docqa --bin docqa-server

use docqa::{config::API_KEY_VAR, server::DocQaServer, AppConfig};
use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    // Initialize tracing: stdout plus an optional plain-text log file
    let file_layer = match &config.logging.file {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docqa=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    if !config.has_credential() {
        tracing::error!("{} not found", API_KEY_VAR);
        anyhow::bail!(
            "Google API key not found. Set {} in your environment or .env file.",
            API_KEY_VAR
        );
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Generation model: {}", config.gemini.generate_model);
    tracing::info!("  - Embedding model: {}", config.gemini.embed_model);
    tracing::info!(
        "  - Chunk size: {} (overlap {})",
        config.index.chunk_size,
        config.index.chunk_overlap
    );
    tracing::info!("  - Scratch dir: {}", config.storage.scratch_dir.display());
    tracing::info!("  - Index root: {}", config.storage.index_root.display());

    let server = DocQaServer::new(config)?;

    println!("\nServer starting...");
    println!("  UI: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
