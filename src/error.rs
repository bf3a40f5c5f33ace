//! Failure taxonomy for outbound fetches

use reqwest::StatusCode;

/// Why a fetch attempt failed.
///
/// Everything except [`FetchError::Empty`] is transient and eligible for a retry.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request never produced a response (DNS, connect, TLS, timeout...)
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with {status}")]
    Status { url: String, status: StatusCode },

    /// 2xx, but the body is not JSON
    #[error("Response from {url} is not valid JSON: {source}")]
    Malformed {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Well-formed response carrying no data
    #[error("No data found in response from {url}")]
    Empty { url: String },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Empty { .. })
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Transport { url, .. }
            | Self::Status { url, .. }
            | Self::Malformed { url, .. }
            | Self::Empty { url } => url,
        }
    }
}
