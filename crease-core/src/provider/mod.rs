//! Shared plumbing for HTTP-backed collaborators (embeddings, search, chat).

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

/// Errors that can occur when calling a remote provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Network-level failure (DNS, timeout, connection reset, etc.)
    #[error("network error: {0}")]
    Network(String),
    /// Authentication failure (invalid or expired API key)
    #[error("auth error: {0}")]
    Auth(String),
    /// Rate limit exceeded
    #[error("rate limited: {0}")]
    RateLimit(String),
    /// Response could not be parsed
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// Any other error
    #[error("{0}")]
    Other(String),
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Structured { message: String },
    Plain(String),
}

/// Map an HTTP error status code and body to a `ProviderError`.
///
/// Understands both the OpenAI shape (`{"error": {"message": ..}}`) and the
/// flat shape used by search APIs (`{"error": ".."}`).
pub fn map_error_status(status: u16, body: &str) -> ProviderError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|r| match r.error {
            ErrorDetail::Structured { message } => message,
            ErrorDetail::Plain(message) => message,
        })
        .unwrap_or_else(|_| body.to_string());

    match status {
        401 | 403 => ProviderError::Auth(message),
        429 => ProviderError::RateLimit(message),
        _ => ProviderError::Other(format!("HTTP {status}: {message}")),
    }
}

/// Build an HTTP client with a per-request timeout.
pub fn build_client(timeout: Duration) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::Other(format!("failed to build HTTP client: {e}")))
}

/// Join a base endpoint and a path without doubling the slash.
pub fn endpoint_url(endpoint: &str, path: &str) -> String {
    format!("{}/{}", endpoint.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_error_status_401_is_auth() {
        let body = r#"{"error": {"message": "Invalid API key"}}"#;
        match map_error_status(401, body) {
            ProviderError::Auth(msg) => assert_eq!(msg, "Invalid API key"),
            other => panic!("expected Auth, got {other:?}"),
        }
    }

    #[test]
    fn map_error_status_429_is_rate_limit() {
        let body = r#"{"error": "slow down"}"#;
        match map_error_status(429, body) {
            ProviderError::RateLimit(msg) => assert_eq!(msg, "slow down"),
            other => panic!("expected RateLimit, got {other:?}"),
        }
    }

    #[test]
    fn map_error_status_keeps_raw_body_when_not_json() {
        let err = map_error_status(500, "upstream exploded");
        assert_eq!(err.to_string(), "HTTP 500: upstream exploded");
    }

    #[test]
    fn endpoint_url_handles_trailing_slash() {
        assert_eq!(
            endpoint_url("https://api.openai.com/v1/", "/embeddings"),
            "https://api.openai.com/v1/embeddings"
        );
        assert_eq!(
            endpoint_url("https://api.exa.ai", "search"),
            "https://api.exa.ai/search"
        );
    }
}
