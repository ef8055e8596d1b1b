//! Error handling for the HTTP layer.

use std::fmt;
use std::time::Duration;

use axum::{http::StatusCode, response::IntoResponse, Json};

use super::types::Response;

/// Errors returned from request handlers
#[derive(Debug)]
pub enum ApiError {
    /// The request body could not be read or decoded
    ValidationError(String),
    /// The broker call failed
    InternalError(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let message = match self {
            ApiError::ValidationError(msg) | ApiError::InternalError(msg) => msg,
        };

        (status, Json(Response::error(message))).into_response()
    }
}

/// Errors from running the server itself
#[derive(Debug)]
pub enum ServerError {
    Io(std::io::Error),
    /// In-flight requests did not finish within the shutdown timeout
    ShutdownTimeout(Duration),
    /// The server task panicked or was cancelled
    Task(String),
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Io(err)
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Io(e) => write!(f, "server failed: {}", e),
            ServerError::ShutdownTimeout(t) => write!(f, "failed to shutdown server within {:?}", t),
            ServerError::Task(msg) => write!(f, "server task failed: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {}
