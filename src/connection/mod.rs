// Per-connection reader/writer pump

use crate::config::ConnectionConfig;
use crate::hub::{ConnectionId, HubHandle, Payload};
use crate::protocol::{self, IncomingEvent, OutgoingMessage};
use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

#[cfg(test)]
mod tests;

/// Connection-local state. Only the reader task touches it.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    username: String,
}

/// Broadcast requested by a client event
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub message: OutgoingMessage,
    pub exclude: Option<ConnectionId>,
}

impl Connection {
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            username: String::new(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Display name set by the last `join`, empty until then
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Decode an inbound frame. Malformed and non-data frames yield nothing.
    pub fn handle_frame(&mut self, frame: &Message) -> Option<Outbound> {
        let decoded = match frame {
            Message::Text(text) => protocol::decode(text),
            Message::Binary(data) => protocol::decode_bytes(data),
            _ => return None,
        };

        match decoded {
            Ok(event) => self.handle_event(event),
            Err(e) => {
                debug!(connection_id = %self.id, error = %e, "Discarding malformed frame");
                None
            }
        }
    }

    /// Turn a client event into the broadcast it triggers, if any.
    ///
    /// Chat messages exclude the sender: clients render their own lines
    /// locally and never get an echo.
    pub fn handle_event(&mut self, event: IncomingEvent) -> Option<Outbound> {
        match event {
            IncomingEvent::Join { username } => {
                if username.is_empty() {
                    debug!(connection_id = %self.id, "Ignoring join without username");
                    return None;
                }
                self.username = username;
                info!(connection_id = %self.id, username = %self.username, "Client joined");
                Some(Outbound {
                    message: OutgoingMessage::joined(&self.username),
                    exclude: None,
                })
            }
            IncomingEvent::Message { username, text } => {
                let user = if self.username.is_empty() {
                    username
                } else {
                    self.username.clone()
                };
                if user.is_empty() || text.is_empty() {
                    debug!(connection_id = %self.id, "Ignoring incomplete message");
                    return None;
                }
                Some(Outbound {
                    message: OutgoingMessage::chat(user, text),
                    exclude: Some(self.id),
                })
            }
            IncomingEvent::Unknown => None,
        }
    }
}

/// Why a connection's reader stopped
#[derive(Debug, Clone, PartialEq)]
pub enum CloseReason {
    PeerClosed,
    ReadTimeout,
    ReadError(String),
    WriterStopped,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::PeerClosed => write!(f, "peer closed"),
            CloseReason::ReadTimeout => write!(f, "read deadline exceeded"),
            CloseReason::ReadError(e) => write!(f, "read error: {}", e),
            CloseReason::WriterStopped => write!(f, "writer stopped"),
        }
    }
}

/// Drive one upgraded WebSocket until it closes.
///
/// Registers with the hub before either task consumes anything, then runs the
/// writer as a spawned task and the reader inline. Whatever ends the reader,
/// the connection is removed from the hub exactly here.
pub async fn run_connection(socket: WebSocket, hub: HubHandle, config: ConnectionConfig) {
    let id = ConnectionId::new();
    let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity);

    hub.register(id, queue_tx).await;
    info!(connection_id = %id, "WebSocket connection established");

    let (sink, stream) = socket.split();
    let mut writer = tokio::spawn(write_loop(
        id,
        sink,
        queue_rx,
        config.write_timeout(),
        config.ping_interval(),
    ));

    let reason = read_loop(
        Connection::new(id),
        stream,
        &hub,
        config.read_timeout(),
        &mut writer,
    )
    .await;

    hub.remove(id).await;

    // Queue is closed now; the writer sends its close frame and exits
    if reason != CloseReason::WriterStopped
        && timeout(config.write_timeout(), &mut writer).await.is_err()
    {
        warn!(connection_id = %id, "Writer did not stop in time, aborting");
        writer.abort();
    }

    info!(connection_id = %id, reason = %reason, "WebSocket connection closed");
}

async fn read_loop(
    mut conn: Connection,
    mut stream: SplitStream<WebSocket>,
    hub: &HubHandle,
    read_timeout: Duration,
    writer: &mut JoinHandle<()>,
) -> CloseReason {
    loop {
        let next = tokio::select! {
            next = timeout(read_timeout, stream.next()) => next,
            _ = &mut *writer => return CloseReason::WriterStopped,
        };

        let frame = match next {
            Err(_) => {
                warn!(connection_id = %conn.id, "Read deadline exceeded");
                return CloseReason::ReadTimeout;
            }
            Ok(None) => return CloseReason::PeerClosed,
            Ok(Some(Err(e))) => {
                warn!(connection_id = %conn.id, error = %e, "WebSocket read error");
                return CloseReason::ReadError(e.to_string());
            }
            Ok(Some(Ok(frame))) => frame,
        };

        if let Message::Close(_) = frame {
            return CloseReason::PeerClosed;
        }

        if let Some(outbound) = conn.handle_frame(&frame) {
            match protocol::encode(&outbound.message) {
                Ok(payload) => hub.broadcast(payload, outbound.exclude).await,
                Err(e) => error!(connection_id = %conn.id, error = %e, "Failed to encode message"),
            }
        }
    }
}

async fn write_loop(
    id: ConnectionId,
    mut sink: SplitSink<WebSocket, Message>,
    mut queue: mpsc::Receiver<Payload>,
    write_timeout: Duration,
    ping_interval: Duration,
) {
    let mut ticker = interval_at(Instant::now() + ping_interval, ping_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            payload = queue.recv() => {
                let Some(payload) = payload else {
                    debug!(connection_id = %id, "Queue closed by hub, sending close frame");
                    let _ = send_frame(&mut sink, Message::Close(None), write_timeout).await;
                    break;
                };
                if let Err(e) = send_frame(&mut sink, Message::Text(payload.to_string()), write_timeout).await {
                    warn!(connection_id = %id, error = %e, "Failed to write message");
                    break;
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = send_frame(&mut sink, Message::Ping(Vec::new()), write_timeout).await {
                    warn!(connection_id = %id, error = %e, "Failed to write ping");
                    break;
                }
            }
        }
    }

    // Closing an already closed sink just errors
    let _ = timeout(write_timeout, sink.close()).await;
}

async fn send_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: Message,
    deadline: Duration,
) -> Result<()> {
    timeout(deadline, sink.send(frame))
        .await
        .context("write deadline exceeded")?
        .context("WebSocket write failed")?;
    Ok(())
}
