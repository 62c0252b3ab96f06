use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while fetching a feed document.
///
/// Any of these means the source contributes zero items to the current
/// run; the orchestrator logs the error and moves on to the next source.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("request timed out")]
    Timeout,
    /// Response body exceeded the configured size limit
    #[error("response too large")]
    ResponseTooLarge,
}

/// Bounds applied to every feed fetch.
#[derive(Debug, Clone)]
pub struct FetchLimits {
    /// Maximum time to wait for the response to start.
    pub timeout: Duration,
    /// Maximum accepted response body size in bytes.
    pub max_bytes: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Fetches a feed URL and returns the response body as text.
///
/// The request is bounded by `limits.timeout`; the body is read in chunks
/// and rejected as soon as it exceeds `limits.max_bytes`, so a
/// misbehaving server cannot exhaust memory. Bodies are decoded lossily —
/// feeds with broken encodings still yield whatever text survives.
///
/// There are no retries: a failed source is simply skipped for this run
/// and picked up again on the next one.
pub async fn fetch_text(
    client: &reqwest::Client,
    url: &str,
    limits: &FetchLimits,
) -> Result<String, FetchError> {
    let response = tokio::time::timeout(limits.timeout, client.get(url).send())
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(FetchError::Network)?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    // Fast path: trust Content-Length when the server sends one
    if let Some(len) = response.content_length() {
        if len as usize > limits.max_bytes {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut response = response;
    while let Some(chunk) = response.chunk().await.map_err(FetchError::Network)? {
        if bytes.len().saturating_add(chunk.len()) > limits.max_bytes {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
