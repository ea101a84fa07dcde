use anyhow::{Context, Result};
use chat_relay::api::{serve, AppState};
use chat_relay::config::{load_config, RelayConfig};
use chat_relay::hub::spawn_hub;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_relay=info".into()),
        )
        .init();

    info!("Chat relay starting...");

    // File config (if any) first, env vars on top
    let config = match std::env::var("RELAY_CONFIG") {
        Ok(path) => {
            let mut config = load_config(&path)?;
            config.apply_env();
            info!(path = %path, "Loaded config file");
            config
        }
        Err(_) => RelayConfig::from_env(),
    };
    config.validate().context("Invalid configuration")?;

    info!(
        listen_addr = %config.server.listen_addr,
        queue_capacity = config.connection.queue_capacity,
        max_message_bytes = config.connection.max_message_bytes,
        read_timeout_secs = config.connection.read_timeout_secs,
        ping_interval_secs = config.connection.ping_interval_secs,
        "Configuration loaded"
    );

    let hub = spawn_hub(config.hub.command_buffer);

    let listener = TcpListener::bind(config.server.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen_addr))?;

    let state = AppState {
        hub,
        connection: config.connection.clone(),
    };
    serve(listener, state, shutdown_signal()).await?;

    info!("Chat relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
