//! Shared HTTP plumbing for the API clients.

use log::{debug, error};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;

use brokerlink_core::{Error, Result};

/// Builds the reqwest client used by every API client.
pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::http(None, format!("Failed to initialize HTTP client: {}", e)))
}

/// Maps a transport-level failure. Timeouts surface once, without retry.
pub(crate) fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        return Error::http(None, "request timed out");
    }
    Error::http(e.status().map(|s| s.as_u16()), format!("Request failed: {}", e))
}

/// Reads the status and the full body of a response.
pub(crate) async fn read_body(response: reqwest::Response) -> Result<(StatusCode, String)> {
    let (status, body) = read_body_unlogged(response).await?;
    debug!("[BrokerLinkApi] Response ({}): {}", status, body);
    Ok((status, body))
}

/// Like [`read_body`], for responses that carry tokens and must stay out of logs.
pub(crate) async fn read_body_unlogged(
    response: reqwest::Response,
) -> Result<(StatusCode, String)> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;
    Ok((status, body))
}

/// Extracts a human-readable error message from an error body.
///
/// Understands `{detail}` (string or structured), `{message}`, `{msg}`,
/// `{error_description}` and `{error}`.
pub(crate) fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    for key in ["detail", "message", "msg", "error_description", "error"] {
        match value.get(key) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(serde_json::Value::Null) | None => continue,
            Some(other) => return Some(other.to_string()),
        }
    }
    None
}

/// Builds the error for a non-2xx response.
pub(crate) fn status_error(status: StatusCode, body: &str) -> Error {
    let detail = error_detail(body).unwrap_or_else(|| {
        let snippet: String = body.chars().take(200).collect();
        if snippet.is_empty() {
            format!("HTTP {}", status)
        } else {
            snippet
        }
    });
    Error::http(Some(status.as_u16()), detail)
}

/// Parses a 2xx body against its schema. A shape mismatch fails closed.
///
/// `component` is the log prefix of the calling client.
pub(crate) fn parse_json<T: DeserializeOwned>(
    component: &str,
    status: StatusCode,
    body: &str,
) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        error!("{} Failed to deserialize response: {}", component, e);
        Error::http(
            Some(status.as_u16()),
            format!("Unexpected response shape: {}", e),
        )
    })
}

/// Checks the status and parses the body in one step.
pub(crate) fn parse_response<T: DeserializeOwned>(
    component: &str,
    status: StatusCode,
    body: &str,
) -> Result<T> {
    if !status.is_success() {
        return Err(status_error(status, body));
    }
    parse_json(component, status, body)
}
