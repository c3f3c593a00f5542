//! HTTP client construction and status mapping.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};

use crate::error::SluiceError;

/// Build the client used for completion calls. Streams can run for a long
/// time, so there is no overall timeout unless one is configured.
pub fn build_client(timeout: Option<Duration>) -> Result<reqwest::Client, SluiceError> {
    let mut builder = reqwest::Client::builder().pool_max_idle_per_host(10);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| SluiceError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Headers for a bearer-token, event-stream request.
pub fn bearer_headers(api_key: &str) -> Result<HeaderMap, SluiceError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
    let auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
        .map_err(|_| SluiceError::Authentication("API key contains invalid header characters".into()))?;
    headers.insert(AUTHORIZATION, auth);
    Ok(headers)
}

/// Map a non-success HTTP status and its body to an error.
pub fn status_to_error(status: u16, body: &str) -> SluiceError {
    match status {
        401 | 403 => SluiceError::Authentication(error_message(body)),
        429 => SluiceError::RateLimited {
            retry_after_ms: extract_retry_after(body),
        },
        _ => SluiceError::api(status, error_message(body)),
    }
}

/// Prefer `error.message` from a JSON error body, else the body itself.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

fn extract_retry_after(body: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}
