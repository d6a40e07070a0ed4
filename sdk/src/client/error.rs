//! Client error types.
//!
//! Failures of the admin REST API as the sync layer sees them. Refetch
//! failures only leave a query group stale; mutation failures are shown to
//! the user, so the variants keep enough detail for a readable notice.

use std::fmt;

/// Client errors.
#[derive(Debug)]
pub enum ClientError {
    /// The request never produced a response (DNS, TLS, connection reset).
    Transport(reqwest::Error),

    /// The response body was not the JSON the caller expected.
    InvalidResponse(String),

    /// The API rejected the request with a structured error body.
    Api {
        /// HTTP status.
        status: u16,
        /// Machine-readable error code, e.g. `ORDER_LOCKED`.
        code: String,
        /// Human-readable message.
        message: String,
    },

    /// Non-success status without a structured error body.
    Http {
        /// HTTP status.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// Too many requests (429) after exhausting retries.
    RateLimited {
        /// Seconds the server asked to wait.
        retry_after: Option<u64>,
    },

    /// No such collection or item (404).
    NotFound(String),

    /// The session cookie is missing or expired (401).
    SessionExpired,

    /// The admin lacks the role for this resource (403).
    Forbidden(String),

    /// Invalid configuration.
    InvalidConfig(String),

    /// The request timed out, or the data source is offline.
    Timeout,
}

impl ClientError {
    /// Returns the HTTP status the error came with, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } | Self::Http { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            Self::NotFound(_) => Some(404),
            Self::SessionExpired => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::Transport(_) | Self::InvalidResponse(_) | Self::InvalidConfig(_) | Self::Timeout => {
                None
            }
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "API unreachable: {}", e),
            Self::InvalidResponse(msg) => write!(f, "unexpected API response: {}", msg),
            Self::Api { code, message, .. } => write!(f, "{} ({})", message, code),
            Self::Http { status, body } if body.is_empty() => write!(f, "HTTP {}", status),
            Self::Http { status, body } => write!(f, "HTTP {}: {}", status, body),
            Self::RateLimited {
                retry_after: Some(secs),
            } => write!(f, "too many requests, retry in {}s", secs),
            Self::RateLimited { retry_after: None } => write!(f, "too many requests"),
            Self::NotFound(path) => write!(f, "{} not found", path),
            Self::SessionExpired => write!(f, "session expired, sign in again"),
            Self::Forbidden(path) => write!(f, "not allowed to access {}", path),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Self::Timeout => write!(f, "request timed out"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_api_reads_as_notice() {
        let err = ClientError::Api {
            status: 409,
            code: "ORDER_LOCKED".to_string(),
            message: "order is in escrow".to_string(),
        };
        assert_eq!(err.to_string(), "order is in escrow (ORDER_LOCKED)");
        assert_eq!(err.status(), Some(409));
    }

    #[test]
    fn test_client_error_http() {
        let err = ClientError::Http {
            status: 502,
            body: String::new(),
        };
        assert_eq!(err.to_string(), "HTTP 502");

        let err = ClientError::Http {
            status: 500,
            body: "upstream down".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 500: upstream down");
    }

    #[test]
    fn test_client_error_rate_limited() {
        let err = ClientError::RateLimited {
            retry_after: Some(30),
        };
        assert_eq!(err.to_string(), "too many requests, retry in 30s");
        assert_eq!(
            ClientError::RateLimited { retry_after: None }.to_string(),
            "too many requests"
        );
    }

    #[test]
    fn test_client_error_auth() {
        assert_eq!(
            ClientError::SessionExpired.to_string(),
            "session expired, sign in again"
        );
        assert_eq!(ClientError::SessionExpired.status(), Some(401));
        assert_eq!(
            ClientError::Forbidden("/settings".to_string()).to_string(),
            "not allowed to access /settings"
        );
    }

    #[test]
    fn test_client_error_without_status() {
        assert_eq!(ClientError::Timeout.status(), None);
        assert_eq!(
            ClientError::NotFound("/orders".to_string()).to_string(),
            "/orders not found"
        );
    }
}
