//! Live process configuration.
//!
//! Read from `FLEETDESK_*` environment variables; unset variables keep
//! their defaults.

use std::time::Duration;

use fleetdesk_sdk::client::config::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use fleetdesk_sdk::flash::DEFAULT_FLASH_DURATION_MS;
use fleetdesk_sdk::router::DEFAULT_ROUTES;
use fleetdesk_sdk::ws::config::{
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY_MS, DEFAULT_WS_URL,
};
use fleetdesk_sdk::{ClientConfig, FlashStyle, WsConfig};
use serde::{Deserialize, Serialize};

/// Configuration for the live process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveConfig {
    /// REST base URL.
    pub api_url: String,

    /// Push channel URL.
    pub ws_url: String,

    /// Session token sent as cookie and on the push channel.
    pub session_token: Option<String>,

    /// Events to subscribe to. Empty means every routed event.
    pub events: Vec<String>,

    /// Highlight style.
    pub flash_style: FlashStyle,

    /// Highlight duration in milliseconds.
    pub flash_duration_ms: u64,

    /// Delay between reconnects in milliseconds.
    pub reconnect_delay_ms: u64,

    /// Closes tolerated before giving up.
    pub max_reconnect_attempts: u32,

    /// REST request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_BASE_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            session_token: None,
            events: Vec::new(),
            flash_style: FlashStyle::Default,
            flash_duration_ms: DEFAULT_FLASH_DURATION_MS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl LiveConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but unparseable, or the result
    /// fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = var("FLEETDESK_API_URL") {
            config.api_url = url;
        }
        if let Some(url) = var("FLEETDESK_WS_URL") {
            config.ws_url = url;
        }
        config.session_token = var("FLEETDESK_SESSION_TOKEN");
        if let Some(events) = var("FLEETDESK_EVENTS") {
            config.events = events
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(style) = var("FLEETDESK_FLASH_STYLE") {
            config.flash_style = style
                .parse()
                .map_err(|_| ConfigError::InvalidValue("FLEETDESK_FLASH_STYLE", style))?;
        }
        if let Some(ms) = var("FLEETDESK_FLASH_DURATION_MS") {
            config.flash_duration_ms = parse_number("FLEETDESK_FLASH_DURATION_MS", ms)?;
        }
        if let Some(ms) = var("FLEETDESK_RECONNECT_DELAY_MS") {
            config.reconnect_delay_ms = parse_number("FLEETDESK_RECONNECT_DELAY_MS", ms)?;
        }
        if let Some(n) = var("FLEETDESK_MAX_RECONNECT_ATTEMPTS") {
            config.max_reconnect_attempts = parse_number("FLEETDESK_MAX_RECONNECT_ATTEMPTS", n)?;
        }
        if let Some(secs) = var("FLEETDESK_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = parse_number("FLEETDESK_REQUEST_TIMEOUT_SECS", secs)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Sets the session token.
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Sets the subscribed events.
    #[must_use]
    pub fn with_events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.events = events.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the highlight style.
    #[must_use]
    pub fn with_flash_style(mut self, style: FlashStyle) -> Self {
        self.flash_style = style;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flash_duration_ms == 0 {
            return Err(ConfigError::InvalidFlashDuration);
        }

        self.client_config()
            .validate()
            .map_err(|e| ConfigError::Client(e.to_string()))?;
        self.ws_config()
            .validate()
            .map_err(|e| ConfigError::Realtime(e.to_string()))?;

        Ok(())
    }

    /// Returns the highlight duration.
    #[must_use]
    pub fn flash_duration(&self) -> Duration {
        Duration::from_millis(self.flash_duration_ms)
    }

    /// Builds the REST client configuration.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::new(self.api_url.as_str())
            .with_timeout(Duration::from_secs(self.request_timeout_secs));
        match &self.session_token {
            Some(token) => config.with_session_token(token.as_str()),
            None => config,
        }
    }

    /// Builds the push channel configuration.
    ///
    /// With no events configured, every event of the default route table is
    /// subscribed.
    #[must_use]
    pub fn ws_config(&self) -> WsConfig {
        let config = if self.events.is_empty() {
            WsConfig::new(self.ws_url.as_str()).with_events(DEFAULT_ROUTES.iter().map(|(e, _)| *e))
        } else {
            WsConfig::new(self.ws_url.as_str()).with_events(self.events.iter().cloned())
        };
        let config = config
            .with_reconnect_delay(Duration::from_millis(self.reconnect_delay_ms))
            .with_max_reconnect_attempts(self.max_reconnect_attempts);
        match &self.session_token {
            Some(token) => config.with_session_token(token.as_str()),
            None => config,
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name, value))
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A variable could not be parsed.
    #[error("invalid value for {0}: {1:?}")]
    InvalidValue(&'static str, String),

    /// Zero highlight duration.
    #[error("flash_duration_ms must be > 0")]
    InvalidFlashDuration,

    /// REST settings rejected.
    #[error("api: {0}")]
    Client(String),

    /// Push channel settings rejected.
    #[error("realtime: {0}")]
    Realtime(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = LiveConfig::default();
        assert_eq!(config.flash_duration_ms, 2000);
        assert_eq!(config.reconnect_delay_ms, 3000);
        assert_eq!(config.max_reconnect_attempts, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_empty_env() {
        let config = tokio_test::assert_ok!(LiveConfig::from_lookup(lookup(&[])));
        assert_eq!(config, LiveConfig::default());
    }

    #[test]
    fn test_config_from_env() {
        let config = LiveConfig::from_lookup(lookup(&[
            ("FLEETDESK_WS_URL", "ws://localhost:4000/ws"),
            ("FLEETDESK_SESSION_TOKEN", "abc"),
            ("FLEETDESK_EVENTS", "new_order, order_updated,,"),
            ("FLEETDESK_FLASH_STYLE", "pulse"),
            ("FLEETDESK_FLASH_DURATION_MS", "1500"),
            ("FLEETDESK_MAX_RECONNECT_ATTEMPTS", "3"),
        ]))
        .expect("config");

        assert_eq!(config.ws_url, "ws://localhost:4000/ws");
        assert_eq!(config.session_token.as_deref(), Some("abc"));
        assert_eq!(config.events, vec!["new_order", "order_updated"]);
        assert_eq!(config.flash_style, FlashStyle::Pulse);
        assert_eq!(config.flash_duration(), Duration::from_millis(1500));
        assert_eq!(config.max_reconnect_attempts, 3);
    }

    #[test]
    fn test_config_invalid_number() {
        let result = LiveConfig::from_lookup(lookup(&[("FLEETDESK_RECONNECT_DELAY_MS", "soon")]));
        assert_eq!(
            result,
            Err(ConfigError::InvalidValue(
                "FLEETDESK_RECONNECT_DELAY_MS",
                "soon".to_string()
            ))
        );
    }

    #[test]
    fn test_config_invalid_style() {
        let result = LiveConfig::from_lookup(lookup(&[("FLEETDESK_FLASH_STYLE", "sparkle")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_validate_rejects_bad_ws_url() {
        let config = LiveConfig {
            ws_url: "http://localhost".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Realtime(_))));
    }

    #[test]
    fn test_config_validate_zero_flash() {
        let config = LiveConfig {
            flash_duration_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidFlashDuration));
    }

    #[test]
    fn test_ws_config_defaults_to_routed_events() {
        let ws = LiveConfig::default().ws_config();
        assert!(ws.events.contains(&"new_order".to_string()));
        assert!(ws.events.contains(&"new_message".to_string()));
        assert_eq!(ws.max_reconnect_attempts, 5);
    }

    #[test]
    fn test_ws_config_carries_token() {
        let ws = LiveConfig::default()
            .with_session_token("t0k")
            .with_events(["new_order"])
            .ws_config();
        assert_eq!(ws.events, vec!["new_order"]);
        assert_eq!(ws.session_token.as_deref(), Some("t0k"));
    }

    #[test]
    fn test_config_serde() {
        let config = LiveConfig::default().with_flash_style(FlashStyle::Glow);
        let json = serde_json::to_string(&config).expect("serialize");
        assert!(json.contains("\"glow\""));
        let back: LiveConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, config);
    }
}
