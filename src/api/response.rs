use std::any::Any;

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::engine::PoolError;
use crate::repositories::RepositoryError;

pub const PIPELINE_ERROR_BODY: &str = "Telemetry Pipeline Error: Check logs.";

pub type ApiResult<T> = Result<T, ApiError>;

/// Catch-all failure on the request path. Every variant answers the same way:
/// logged with its cause, returned as a 500 with a fixed body.
#[derive(Debug)]
pub struct ApiError {
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("[CRITICAL ERROR] Pipeline Interrupted: {}", self.message);
        pipeline_error()
    }
}

fn pipeline_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, PIPELINE_ERROR_BODY).into_response()
}

/// Response for a handler that panicked.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    ApiError::new(format!("handler panicked: {}", message)).into_response()
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<PoolError> for ApiError {
    fn from(err: PoolError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        Self::new(err.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(err: PathRejection) -> Self {
        Self::new(err.body_text())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(err.to_string())
    }
}
