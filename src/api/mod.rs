// HTTP surface: status page and WebSocket endpoint

pub mod websocket;

pub use websocket::ws_handler;

use crate::config::ConnectionConfig;
use crate::hub::HubHandle;
use anyhow::{Context, Result};
use axum::{http::header, response::IntoResponse, routing::get, Router};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

pub const STATUS_TEXT: &str = "Chatroom backend running. WebSocket at /ws\n";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub connection: ConnectionConfig,
}

/// Create router with the status page and WebSocket endpoint.
///
/// Origins are not restricted.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// GET / - plain-text liveness page
async fn status() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], STATUS_TEXT)
}

/// Serve the relay on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().context("Failed to read listener address")?;
    info!(addr = %addr, "Listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")?;

    Ok(())
}
