//! Real-time chat relay over WebSockets.
//!
//! Every client event is fanned out through a single [`hub::Hub`] task that
//! owns the set of live connections:
//!
//! - [`protocol`] decodes client events and encodes broadcast lines.
//! - [`connection`] runs the reader/writer pair for one WebSocket.
//! - [`hub`] serializes register, remove and broadcast commands. A recipient
//!   whose outbound queue is full is evicted instead of slowing everyone down.
//! - [`api`] exposes the status page and the `/ws` upgrade endpoint.
//! - [`config`] loads limits and deadlines from TOML or `RELAY_*` env vars.
//!
//! Chat messages are never echoed back to their sender. Clients are expected
//! to render their own outgoing lines locally. Join announcements go to
//! everyone, sender included.

// Limits, deadlines and listen address
pub mod config;

// Wire protocol
pub mod protocol;

// Connection set and broadcast fan-out
pub mod hub;

// Per-connection reader/writer tasks
pub mod connection;

// HTTP and WebSocket endpoints
pub mod api;
