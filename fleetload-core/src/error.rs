//! Error types for the load-test core

use fleetload_config::ConfigError;
use fleetload_http::HttpError;
use thiserror::Error;

/// Errors that stop a worker or the whole run
#[derive(Debug, Error)]
pub enum LoadTestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Token source returned an empty token")]
    TokenEmpty,

    #[error("Freshly fetched token is already expired or carries no expiry")]
    TokenExpired,

    #[error("Token fetch failed: {0}")]
    TokenFetch(String),

    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("Manual cleanup required: {kind} {id} still exists after {attempts} delete attempts")]
    ManualCleanupRequired {
        kind: String,
        id: String,
        attempts: u32,
    },

    #[error("Helper unavailable: {0}")]
    HelperUnavailable(String),

    #[error("Invalid endpoint distribution: {0}")]
    Distribution(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for the core crate
pub type Result<T> = std::result::Result<T, LoadTestError>;

impl LoadTestError {
    /// Whether this error ends the whole run rather than a single worker
    pub fn aborts_run(&self) -> bool {
        matches!(
            self,
            LoadTestError::Config(_)
                | LoadTestError::TokenEmpty
                | LoadTestError::TokenExpired
                | LoadTestError::TokenFetch(_)
                | LoadTestError::ManualCleanupRequired { .. }
        )
    }
}
