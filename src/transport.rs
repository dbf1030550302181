//! Transport capability and its reqwest-backed implementation.
//!
//! Routes are joined onto a fixed service prefix. Non-success responses are
//! turned into `TransportError::Backend` carrying the reason string from the
//! JSON error envelope.

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::model::{OperationRequest, Route, Verb};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

/// Maximum response body size (10 MB).
const MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and return the decoded JSON response.
    async fn send(&self, request: &OperationRequest) -> Result<serde_json::Value, TransportError>;
}

/// Send a request and decode the response into `T`.
pub async fn send_json<T: DeserializeOwned>(
    transport: &dyn Transport,
    request: &OperationRequest,
) -> Result<T, TransportError> {
    let value = transport.send(request).await?;
    serde_json::from_value(value).map_err(|e| {
        TransportError::Decode(format!("{} {}: {e}", request.verb, request.route))
    })
}

// ---------------------------------------------------------------------------
// URL validation
// ---------------------------------------------------------------------------

/// Validate the service prefix.
/// - Must be http:// or https://
/// - Gets a trailing `/` so routes join below it instead of replacing its last segment
fn validate_base_url(base: &str) -> Result<url::Url, String> {
    let normalized = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    };
    let parsed = url::Url::parse(&normalized).map_err(|e| format!("Invalid base URL: {e}"))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(format!("Scheme \"{scheme}\" is not allowed; use http or https")),
    }
    if parsed.cannot_be_a_base() {
        return Err(format!("Base URL \"{base}\" cannot carry routes"));
    }
    Ok(parsed)
}

/// Pull the reason string out of an error body: `message`, then `reason`, then `error`.
fn error_reason(body: &[u8], status: reqwest::StatusCode) -> String {
    if let Ok(json) = serde_json::from_slice::<serde_json::Value>(body) {
        for key in ["message", "reason", "error"] {
            if let Some(reason) = json[key].as_str()
                && !reason.is_empty()
            {
                return reason.to_string();
            }
        }
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    if !text.is_empty() {
        return text;
    }
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

pub struct HttpTransport {
    client: reqwest::Client,
    base: url::Url,
    token: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, String> {
        let base = validate_base_url(&config.base_url)?;

        let mut builder = reqwest::Client::builder().redirect(reqwest::redirect::Policy::limited(5));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(std::time::Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

        Ok(Self {
            client,
            base,
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }

    pub fn url_for(&self, route: Route) -> Result<url::Url, TransportError> {
        self.base
            .join(route.as_str())
            .map_err(|e| TransportError::Network(format!("Invalid route {route}: {e}")))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &OperationRequest) -> Result<serde_json::Value, TransportError> {
        let url = self.url_for(request.route)?;
        tracing::debug!(verb = %request.verb, %url, "sending request");

        let mut builder = self.client.request(request.verb.into(), url);
        if let Some(ref token) = self.token {
            builder = builder.header(reqwest::header::AUTHORIZATION, format!("token {token}"));
        }
        if request.verb != Verb::Get && !request.body.is_empty() {
            builder = builder.json(&request.body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::NO_CONTENT {
            return Err(TransportError::NoContent);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(format!("Failed to read response body: {e}")))?;

        if body.len() > MAX_RESPONSE_BYTES {
            return Err(TransportError::Decode(format!(
                "Response body exceeds maximum size ({} bytes > {} bytes)",
                body.len(),
                MAX_RESPONSE_BYTES
            )));
        }

        if !status.is_success() {
            return Err(TransportError::Backend {
                status: status.as_u16(),
                reason: error_reason(&body, status),
            });
        }

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::json!({}));
        }
        serde_json::from_slice(&body)
            .map_err(|e| TransportError::Decode(format!("Failed to parse response: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
