//! Push channel configuration.
//!
//! Provides configuration options for a realtime session.

use std::time::Duration;

use super::error::WsError;

/// Default push channel URL.
pub const DEFAULT_WS_URL: &str = "wss://realtime.fleetdesk.example/ws";

/// Default delay between reconnect attempts in milliseconds.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3000;

/// Default maximum consecutive reconnect attempts.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default capacity of the status/notice channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Push channel configuration.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// WebSocket URL.
    pub url: String,

    /// Event names subscribed after every successful open.
    pub events: Vec<String>,

    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,

    /// Consecutive failed connections tolerated before giving up.
    pub max_reconnect_attempts: u32,

    /// Optional session token passed to the server as a query parameter.
    pub session_token: Option<String>,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            events: Vec::new(),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            session_token: None,
        }
    }
}

impl WsConfig {
    /// Creates a new configuration with the given URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Adds an event to the subscription set. Duplicates are ignored.
    #[must_use]
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        let event = event.into();
        if !self.events.contains(&event) {
            self.events.push(event);
        }
        self
    }

    /// Adds several events to the subscription set.
    #[must_use]
    pub fn with_events<I, S>(self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        events
            .into_iter()
            .fold(self, |config, event| config.with_event(event))
    }

    /// Sets the reconnect delay.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the maximum reconnect attempts.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Sets the session token.
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Returns the connection URL with the session token if set.
    #[must_use]
    pub fn connection_url(&self) -> String {
        match &self.session_token {
            Some(token) => {
                if self.url.contains('?') {
                    format!("{}&token={}", self.url, token)
                } else {
                    format!("{}?token={}", self.url, token)
                }
            }
            None => self.url.clone(),
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), WsError> {
        if self.url.is_empty() {
            return Err(WsError::InvalidConfig("url cannot be empty".to_string()));
        }

        if !self.url.starts_with("ws://") && !self.url.starts_with("wss://") {
            return Err(WsError::InvalidConfig(
                "url must start with ws:// or wss://".to_string(),
            ));
        }

        if self.max_reconnect_attempts == 0 {
            return Err(WsError::InvalidConfig(
                "max_reconnect_attempts must be > 0".to_string(),
            ));
        }

        if self.events.iter().any(|e| e.trim().is_empty()) {
            return Err(WsError::InvalidConfig(
                "event names cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = WsConfig::default();
        assert_eq!(config.url, DEFAULT_WS_URL);
        assert_eq!(config.reconnect_delay, Duration::from_millis(3000));
        assert_eq!(config.max_reconnect_attempts, 5);
        assert!(config.events.is_empty());
        assert!(config.session_token.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = WsConfig::new("wss://example.com/ws")
            .with_events(["new_order", "order_updated"])
            .with_reconnect_delay(Duration::from_millis(10))
            .with_max_reconnect_attempts(3)
            .with_session_token("abc");

        assert_eq!(config.url, "wss://example.com/ws");
        assert_eq!(config.events, vec!["new_order", "order_updated"]);
        assert_eq!(config.reconnect_delay, Duration::from_millis(10));
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.session_token, Some("abc".to_string()));
    }

    #[test]
    fn test_config_events_deduplicated_in_order() {
        let config = WsConfig::new("wss://example.com/ws")
            .with_event("new_order")
            .with_event("new_user")
            .with_event("new_order");
        assert_eq!(config.events, vec!["new_order", "new_user"]);
    }

    #[test]
    fn test_config_connection_url() {
        let config = WsConfig::new("wss://example.com/ws");
        assert_eq!(config.connection_url(), "wss://example.com/ws");

        let config = config.with_session_token("t1");
        assert_eq!(config.connection_url(), "wss://example.com/ws?token=t1");

        let config = WsConfig::new("wss://example.com/ws?v=2").with_session_token("t1");
        assert_eq!(config.connection_url(), "wss://example.com/ws?v=2&token=t1");
    }

    #[test]
    fn test_config_validate() {
        assert!(WsConfig::new("wss://example.com/ws").validate().is_ok());
        assert!(WsConfig::new("").validate().is_err());
        assert!(WsConfig::new("https://example.com/ws").validate().is_err());
        assert!(WsConfig::new("ws://localhost:1")
            .with_max_reconnect_attempts(0)
            .validate()
            .is_err());
        assert!(WsConfig::new("ws://localhost:1")
            .with_event(" ")
            .validate()
            .is_err());
    }
}
