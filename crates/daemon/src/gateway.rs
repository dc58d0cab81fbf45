//! HTTP gateway to the *arr servers.
//!
//! A gateway sends one authenticated request and hands back the decoded JSON
//! body. Every call is a single attempt: there is no retry layer.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Header carrying the instance API key.
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Error type for gateway calls
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connection, timeout or client construction failure
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("{method} {url} returned HTTP {status}")]
    Status {
        method: Method,
        url: String,
        status: u16,
    },

    /// Response body was not valid JSON, or not the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// A body was expected but the server sent none
    #[error("{0} returned an empty body")]
    EmptyBody(String),
}

/// A single outbound call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub api_key: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            api_key: api_key.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Whether a method changes server state (and is therefore skipped in dry-run mode).
pub fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Transport used by instances. Shared by every instance for the process lifetime.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Send the request once. `Ok(None)` means the server answered with an empty body.
    async fn send(&self, request: ApiRequest) -> Result<Option<Value>, GatewayError>;
}

/// reqwest-backed gateway with a shared connection pool.
pub struct HttpGateway {
    client: reqwest::Client,
    dry_run: bool,
}

impl HttpGateway {
    /// Create a gateway.
    ///
    /// # Arguments
    /// * `timeout` - Per-request timeout
    /// * `dry_run` - Log mutating calls instead of sending them
    pub fn new(timeout: Duration, dry_run: bool) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, dry_run })
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn send(&self, request: ApiRequest) -> Result<Option<Value>, GatewayError> {
        if self.dry_run && is_mutating(&request.method) {
            let body = request
                .body
                .as_ref()
                .map(|body| body.to_string())
                .unwrap_or_default();
            info!("DRY RUN: skipping {} {} body={}", request.method, request.url, body);
            return Ok(None);
        }

        debug!("{} {}", request.method, request.url);

        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .header(API_KEY_HEADER, &request.api_key);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                method: request.method,
                url: request.url,
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}
