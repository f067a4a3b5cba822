//! Transport failures

use fleetload_resilience::Retryable;

/// A request that never produced an HTTP status
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Connection refused, timeout, TLS failure or a client that could not be built
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid url {0}")]
    InvalidUrl(String),

    #[error("invalid header name {0:?}")]
    InvalidHeaderName(String),
}

impl Retryable for HttpError {
    fn is_retryable(&self) -> bool {
        matches!(self, HttpError::Request(e) if !e.is_builder())
    }
}
