use crate::error::{RelayError, Result};
use std::time::Duration;
use url::Url;

const BYTES_PER_MEGABYTE: f64 = 1_048_576.0;

/// Joins a base URL and an href with exactly one slash between them.
pub fn join_url(base: &str, href: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        href.trim_start_matches('/')
    )
}

/// Derives the local artifact name from the last non-empty path segment of a URL.
pub fn filename_from_url(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw)
        .map_err(|e| RelayError::Validation(format!("Invalid download URL '{}': {}", raw, e)))?;

    parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .filter(|name| *name != "." && *name != "..")
        .map(str::to_string)
        .ok_or_else(|| {
            RelayError::Validation(format!("Download URL '{}' has no file name", raw))
        })
}

/// HTTP client with a whole-request timeout; every outbound edge goes through one of these.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .timeout(timeout)
        .build()
        .map_err(|e| RelayError::ConfigError(format!("Failed to build HTTP client: {}", e)))
}

pub fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MEGABYTE
}
