//! Push channel message types.
//!
//! Defines the message types for WebSocket communication.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client-to-server messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Subscribe to an event.
    Subscribe {
        /// Event name.
        event: String,
    },
}

impl ClientMessage {
    /// Creates a subscribe message.
    #[must_use]
    pub fn subscribe(event: impl Into<String>) -> Self {
        Self::Subscribe {
            event: event.into(),
        }
    }
}

/// Server-to-client envelope.
///
/// The payload is opaque to the sync layer; only the type is inspected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEvent {
    /// Event name.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Event payload.
    #[serde(default)]
    pub payload: Value,
}

impl ServerEvent {
    /// Creates an event.
    #[must_use]
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }

    /// Decodes an envelope from text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a JSON object with a string `type`.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
