//! Connection state machine.
//!
//! The machine is pure: it never touches the network or schedules timers.
//! The session driver feeds it lifecycle callbacks and acts on the
//! [`CloseDecision`] it returns.

use std::time::Duration;

use serde::Serialize;

use super::error::WsError;

/// Lifecycle state of a push connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection and none in progress.
    #[default]
    Disconnected,
    /// First connection attempt in progress.
    Connecting,
    /// Connection open and subscribed.
    Connected,
    /// Connection lost; waiting for or performing a retry.
    Reconnecting,
    /// Retry budget exhausted. Terminal.
    Failed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Observable snapshot of a connection, consumed by status indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConnectionStatus {
    /// Current state.
    pub state: ConnectionState,
    /// Consecutive closes since the last successful open.
    pub attempts: u32,
}

impl ConnectionStatus {
    /// Returns true if the connection is open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected)
    }

    /// Returns true if the connection gave up.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self.state, ConnectionState::Failed)
    }
}

/// What the driver must do after a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    /// Schedule one reconnect after `delay`.
    Reconnect {
        /// Attempt number (1-based).
        attempt: u32,
        /// Delay before the attempt.
        delay: Duration,
    },
    /// Stop retrying.
    GiveUp {
        /// Attempts made.
        attempts: u32,
    },
}

/// Typed connection state machine with a bounded, fixed-delay retry budget.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    status: ConnectionStatus,
    max_attempts: u32,
    delay: Duration,
    error_in_cycle: bool,
}

impl ConnectionMachine {
    /// Creates a machine in the `Disconnected` state.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            status: ConnectionStatus::default(),
            max_attempts,
            delay,
            error_in_cycle: false,
        }
    }

    /// Returns the current status.
    #[must_use]
    pub const fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.status.state
    }

    /// Returns the consecutive attempt count.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.status.attempts
    }

    /// Starts a connection attempt.
    ///
    /// # Errors
    ///
    /// Returns an error when connected already or after giving up.
    pub fn begin_connect(&mut self) -> Result<ConnectionStatus, WsError> {
        self.status.state = match self.status.state {
            ConnectionState::Disconnected => ConnectionState::Connecting,
            ConnectionState::Reconnecting => ConnectionState::Reconnecting,
            from @ (ConnectionState::Connecting
            | ConnectionState::Connected
            | ConnectionState::Failed) => {
                return Err(WsError::InvalidTransition {
                    from,
                    action: "connect",
                })
            }
        };
        self.error_in_cycle = false;
        Ok(self.status)
    }

    /// Records a successful open. Resets the attempt counter.
    pub fn opened(&mut self) -> ConnectionStatus {
        self.status = ConnectionStatus {
            state: ConnectionState::Connected,
            attempts: 0,
        };
        self.error_in_cycle = false;
        self.status
    }

    /// Records a transport error.
    ///
    /// Returns true for the first error of the current cycle, so the caller
    /// notifies once. Reconnects are decided by [`Self::closed`] only.
    pub fn errored(&mut self) -> bool {
        !std::mem::replace(&mut self.error_in_cycle, true)
    }

    /// Records a close and decides whether to retry.
    pub fn closed(&mut self) -> CloseDecision {
        self.error_in_cycle = false;
        if self.status.state == ConnectionState::Failed {
            return CloseDecision::GiveUp {
                attempts: self.status.attempts,
            };
        }

        self.status.attempts = self.status.attempts.saturating_add(1);
        if self.status.attempts < self.max_attempts {
            self.status.state = ConnectionState::Reconnecting;
            CloseDecision::Reconnect {
                attempt: self.status.attempts,
                delay: self.delay,
            }
        } else {
            self.status.state = ConnectionState::Failed;
            CloseDecision::GiveUp {
                attempts: self.status.attempts,
            }
        }
    }

    /// Explicit teardown.
    pub fn shutdown(&mut self) -> ConnectionStatus {
        self.status.state = ConnectionState::Disconnected;
        self.error_in_cycle = false;
        self.status
    }
}
