// Wire protocol for chat frames

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;


/// Display name used for server-generated announcements
pub const SYSTEM_USER: &str = "system";

/// Client → Server events
///
/// Missing or `null` `username`/`text` fields decode as empty strings.
/// Validation is left to the connection reader.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum IncomingEvent {
    #[serde(rename = "join")]
    Join {
        #[serde(default, deserialize_with = "null_as_empty")]
        username: String,
    },
    #[serde(rename = "message")]
    Message {
        #[serde(default, deserialize_with = "null_as_empty")]
        username: String,
        #[serde(default, deserialize_with = "null_as_empty")]
        text: String,
    },
    /// Any other `type` value
    #[serde(other)]
    Unknown,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Server → Client: chat line or system announcement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub user: String,
    pub text: String,
    /// Unix epoch milliseconds, stamped by the server
    pub time: i64,
}

impl OutgoingMessage {
    /// Chat line from `user`, stamped with the current time
    pub fn chat(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            text: text.into(),
            time: Utc::now().timestamp_millis(),
        }
    }

    /// "<name> joined" announcement from the system user
    pub fn joined(username: &str) -> Self {
        Self::chat(SYSTEM_USER, format!("{} joined", username))
    }
}

/// Error decoding an inbound frame
#[derive(Debug)]
pub struct DecodeError(serde_json::Error);

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed client event: {}", self.0)
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// Decode a text frame into a client event
pub fn decode(text: &str) -> Result<IncomingEvent, DecodeError> {
    serde_json::from_str(text).map_err(DecodeError)
}

/// Decode a binary frame into a client event
pub fn decode_bytes(data: &[u8]) -> Result<IncomingEvent, DecodeError> {
    serde_json::from_slice(data).map_err(DecodeError)
}

/// Encode an outgoing message as a JSON text payload
pub fn encode(message: &OutgoingMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}
