// Connection hub: single owner of the live connection set

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;


/// Encoded frame shared between every recipient of one broadcast
pub type Payload = Arc<str>;

/// Sending half of a connection's outbound queue. Only the hub holds it.
pub type OutboundQueue = mpsc::Sender<Payload>;

/// Identity of one live connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Commands consumed by the hub loop, in arrival order
#[derive(Debug)]
pub enum HubCommand {
    Register {
        id: ConnectionId,
        queue: OutboundQueue,
    },
    Remove(ConnectionId),
    Broadcast {
        payload: Payload,
        exclude: Option<ConnectionId>,
    },
    Count(oneshot::Sender<usize>),
}

/// Hub actor. Owns the connection set; nothing else reads or writes it.
pub struct Hub {
    commands: mpsc::Receiver<HubCommand>,
    connections: HashMap<ConnectionId, OutboundQueue>,
}

impl Hub {
    /// Create a hub and the handle used to submit commands to it
    pub fn new(command_buffer: usize) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(command_buffer);
        let hub = Self {
            commands: rx,
            connections: HashMap::new(),
        };
        (hub, HubHandle { tx })
    }

    /// Process commands until every handle has been dropped
    pub async fn run(mut self) {
        info!("Hub started");

        while let Some(command) = self.commands.recv().await {
            self.apply(command);
        }

        info!(
            connections = self.connections.len(),
            "Hub stopped, closing remaining queues"
        );
    }

    fn apply(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register { id, queue } => self.register(id, queue),
            HubCommand::Remove(id) => self.remove(id),
            HubCommand::Broadcast { payload, exclude } => self.broadcast(payload, exclude),
            HubCommand::Count(reply) => {
                let _ = reply.send(self.connections.len());
            }
        }
    }

    fn register(&mut self, id: ConnectionId, queue: OutboundQueue) {
        self.connections.insert(id, queue);
        info!(
            connection_id = %id,
            connections = self.connections.len(),
            "Connection registered"
        );
    }

    /// Dropping the stored sender closes the queue; a second call finds nothing.
    fn remove(&mut self, id: ConnectionId) {
        if self.connections.remove(&id).is_some() {
            info!(
                connection_id = %id,
                connections = self.connections.len(),
                "Connection removed"
            );
        }
    }

    /// Offer `payload` to the current set without ever waiting on a recipient
    fn broadcast(&mut self, payload: Payload, exclude: Option<ConnectionId>) {
        let mut evicted = Vec::new();

        for (id, queue) in &self.connections {
            if Some(*id) == exclude {
                continue;
            }
            match queue.try_send(Arc::clone(&payload)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(connection_id = %id, "Outbound queue full, evicting slow connection");
                    evicted.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(connection_id = %id, "Writer gone, evicting connection");
                    evicted.push(*id);
                }
            }
        }

        for id in evicted {
            self.remove(id);
        }
    }
}

/// Cloneable handle for submitting commands to the hub.
///
/// None of these operations report failure to the caller. If the hub loop is
/// gone the command is logged and dropped.
#[derive(Clone, Debug)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Add a connection to the live set
    pub async fn register(&self, id: ConnectionId, queue: OutboundQueue) {
        self.send(HubCommand::Register { id, queue }).await;
    }

    /// Remove a connection and close its queue. Removing twice is a no-op.
    pub async fn remove(&self, id: ConnectionId) {
        self.send(HubCommand::Remove(id)).await;
    }

    /// Fan `payload` out to every registered connection except `exclude`
    pub async fn broadcast(&self, payload: impl Into<Payload>, exclude: Option<ConnectionId>) {
        self.send(HubCommand::Broadcast {
            payload: payload.into(),
            exclude,
        })
        .await;
    }

    /// Number of registered connections once all earlier commands are processed
    pub async fn connection_count(&self) -> usize {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(HubCommand::Count(reply_tx)).await;
        reply_rx.await.unwrap_or(0)
    }

    async fn send(&self, command: HubCommand) {
        if let Err(e) = self.tx.send(command).await {
            warn!(command = ?e.0, "Hub is not running, command dropped");
        }
    }
}

/// Spawn the hub loop on the current runtime and return its handle
pub fn spawn_hub(command_buffer: usize) -> HubHandle {
    let (hub, handle) = Hub::new(command_buffer);
    tokio::spawn(hub.run());
    handle
}
