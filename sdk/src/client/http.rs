//! HTTP client implementation.
//!
//! Provides the REST client the query cache refetches through.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use super::config::ClientConfig;
use super::error::ClientError;
use crate::cache::{QueryFetcher, QueryKey};

/// API error response format.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

/// API error details.
#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    message: String,
}

/// HTTP client for the FleetDesk admin REST API.
#[derive(Debug, Clone)]
pub struct DashboardClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl DashboardClient {
    /// Creates a new client with the given configuration.
    ///
    /// The session token, if any, is placed in the cookie jar so every
    /// request carries it.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let jar = Arc::new(Jar::default());
        if let Some(ref token) = config.session_token {
            let url = reqwest::Url::parse(&config.base_url)
                .map_err(|e| ClientError::InvalidConfig(e.to_string()))?;
            jar.add_cookie_str(&format!("{}={}", config.session_cookie, token), &url);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .user_agent(&config.user_agent)
            .cookie_provider(jar)
            .build()
            .map_err(ClientError::Transport)?;

        Ok(Self { config, http })
    }

    /// Creates a new client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_defaults() -> Result<Self, ClientError> {
        Self::new(ClientConfig::default())
    }

    /// Creates a new client with the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::new(ClientConfig::new(base_url))
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Makes a GET request to the given path.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.config.url(path);
        self.request_with_retry(path, || self.http.get(&url)).await
    }

    /// Makes a POST request with a JSON body.
    async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.config.url(path);
        self.request_with_retry(path, || self.http.post(&url).json(body))
            .await
    }

    /// Makes a request with retry logic.
    async fn request_with_retry<T, F>(&self, path: &str, request_fn: F) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_error = None;
        let mut retry_count = 0;

        while retry_count <= self.config.max_retries {
            let response = request_fn().send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        let body = resp
                            .text()
                            .await
                            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

                        return serde_json::from_str(&body)
                            .map_err(|e| ClientError::InvalidResponse(e.to_string()));
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("Retry-After")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse().ok());

                        if retry_count < self.config.max_retries {
                            let wait_time = retry_after.unwrap_or(1);
                            tracing::debug!(path, wait_time, "rate limited, retrying");
                            tokio::time::sleep(Duration::from_secs(wait_time)).await;
                            retry_count += 1;
                            continue;
                        }

                        return Err(ClientError::RateLimited { retry_after });
                    }

                    match status {
                        reqwest::StatusCode::NOT_FOUND => {
                            return Err(ClientError::NotFound(path.to_string()))
                        }
                        reqwest::StatusCode::UNAUTHORIZED => return Err(ClientError::SessionExpired),
                        reqwest::StatusCode::FORBIDDEN => {
                            return Err(ClientError::Forbidden(path.to_string()))
                        }
                        _ => {}
                    }

                    let body = resp.text().await.unwrap_or_default();
                    if let Ok(error_resp) = serde_json::from_str::<ApiErrorResponse>(&body) {
                        return Err(ClientError::Api {
                            status: status.as_u16(),
                            code: error_resp.error.code,
                            message: error_resp.error.message,
                        });
                    }

                    return Err(ClientError::Http {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(e) => {
                    if e.is_timeout() && retry_count < self.config.max_retries {
                        retry_count += 1;
                        tokio::time::sleep(Duration::from_millis(100 * (1 << retry_count))).await;
                        last_error = Some(ClientError::from(e));
                        continue;
                    }
                    return Err(ClientError::from(e));
                }
            }
        }

        Err(last_error.unwrap_or(ClientError::Timeout))
    }

    /// Posts a JSON body and returns the JSON response.
    ///
    /// Used as the server call of an optimistic mutation.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API rejects it.
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        self.post(path, body).await
    }
}

impl QueryFetcher for DashboardClient {
    fn fetch<'a>(&'a self, key: &'a QueryKey) -> BoxFuture<'a, Result<Value, ClientError>> {
        Box::pin(async move { self.get(&key.path()).await })
    }
}
