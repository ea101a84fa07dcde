use crate::api::AppState;
use crate::connection::run_connection;
use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
};
use std::sync::Arc;
use tracing::{info, warn};

/// GET /ws - WebSocket upgrade handler
///
/// Inbound messages and frames above `max_message_bytes` are rejected by the
/// protocol layer, which ends the connection with a read error.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("WebSocket upgrade request received");

    let hub = state.hub.clone();
    let config = state.connection.clone();
    let limit = config.max_message_bytes;

    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_failed_upgrade(|e| warn!(error = %e, "WebSocket upgrade failed"))
        .on_upgrade(move |socket| run_connection(socket, hub, config))
}
