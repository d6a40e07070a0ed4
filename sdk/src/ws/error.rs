//! Push channel error types.

use std::fmt;

use super::state::ConnectionState;

/// Push channel errors.
#[derive(Debug)]
pub enum WsError {
    /// Connection failed.
    Connection(String),

    /// WebSocket protocol error.
    Protocol(String),

    /// Failed to serialize message.
    Serialization(String),

    /// Invalid configuration.
    InvalidConfig(String),

    /// Send failed.
    SendFailed(String),

    /// The state machine refused a transition.
    InvalidTransition {
        /// State the machine was in.
        from: ConnectionState,
        /// Transition that was requested.
        action: &'static str,
    },
}

impl fmt::Display for WsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "connection failed: {}", msg),
            Self::Protocol(msg) => write!(f, "protocol error: {}", msg),
            Self::Serialization(msg) => write!(f, "serialization failed: {}", msg),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Self::SendFailed(msg) => write!(f, "send failed: {}", msg),
            Self::InvalidTransition { from, action } => {
                write!(f, "cannot {} while {}", action, from)
            }
        }
    }
}

impl std::error::Error for WsError {}

impl From<tokio_tungstenite::tungstenite::Error> for WsError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_error_display() {
        let err = WsError::Connection("timeout".to_string());
        assert_eq!(err.to_string(), "connection failed: timeout");
        assert_eq!(
            WsError::SendFailed("broken pipe".to_string()).to_string(),
            "send failed: broken pipe"
        );
    }

    #[test]
    fn test_ws_error_invalid_transition() {
        let err = WsError::InvalidTransition {
            from: ConnectionState::Failed,
            action: "connect",
        };
        assert_eq!(err.to_string(), "cannot connect while failed");
    }
}
