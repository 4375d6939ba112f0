use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use chat_service::config::{Cli, Config};
use chat_service::inference::remote::RemoteEngine;
use chat_service::server::chat_api::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "chat_service=debug,tower_http=debug"
    } else {
        "chat_service=info,tower_http=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| filter.into());

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }

    info!("chat-service v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_cli(&cli);

    info!(config = %serde_json::to_string(&config)?, "Configuration loaded");

    // One engine for the whole process.
    let engine = RemoteEngine::new(config.model.clone(), &config.engine.base_url)?;
    info!(endpoint = engine.endpoint(), "Inference engine ready");

    let state = Arc::new(AppState::new(Arc::new(engine), config.model.clone()));
    let app = build_router(state);

    let listen_addr = config.server.addr();
    info!(addr = %listen_addr, "Starting server");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
