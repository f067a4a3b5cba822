//! Helper service errors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HelperError {
    #[error("Unable to unmarshal request body: {0}")]
    InvalidBody(String),

    #[error("Unable to write to file: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Unable to encode config: {0}")]
    Encoding(#[from] serde_yaml::Error),

    #[error("Unable to return token: {0}")]
    Token(String),

    #[error("Unable to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Server(String),
}

pub type HelperResult<T> = Result<T, HelperError>;

impl IntoResponse for HelperError {
    /// Plain-text body with the error message; callers only look at the status
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
