use crate::{models::validation_messages, services::storage_service::StorageError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Failures raised by the catalog services.
#[derive(Debug, Error)]
pub enum ShopError {
    #[error("validation failed")]
    Validation(Vec<String>),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("at most {limit} products can be featured, {requested} requested")]
    LimitExceeded { requested: usize, limit: usize },
    #[error("{0}")]
    Upload(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl ShopError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }

    pub fn product_not_found(id: &str) -> Self {
        Self::NotFound(format!("Product `{id}` not found"))
    }

    /// One-line reason used for per-item failures in batch results.
    pub fn detail(&self) -> String {
        match self {
            Self::Validation(errors) if !errors.is_empty() => errors.join("; "),
            Self::Database(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for ShopError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(validation_messages(&errors))
    }
}

pub type ShopResult<T> = Result<T, ShopError>;

/// HTTP-facing error: a status, a message and optional field-level errors.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub errors: Vec<String>,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            errors: Vec::new(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// 400 carrying field-level problems.
    pub fn validation(errors: Vec<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "Validation error".into(),
            errors,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = if self.errors.is_empty() {
            json!({ "success": false, "message": self.message })
        } else {
            json!({ "success": false, "message": self.message, "errors": self.errors })
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<ShopError> for AppError {
    fn from(err: ShopError) -> Self {
        match err {
            ShopError::Validation(errors) => AppError::validation(errors),
            ShopError::NotFound(msg) => AppError::not_found(msg),
            ShopError::Conflict(msg) => AppError::new(StatusCode::CONFLICT, msg),
            err @ ShopError::LimitExceeded { .. } => AppError::bad_request(err.to_string()),
            ShopError::Upload(msg) => AppError::bad_request(msg),
            ShopError::Storage(err) => err.into(),
            ShopError::Database(err) => {
                tracing::error!(error = %err, "database failure");
                AppError::internal("Internal server error")
            }
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ObjectNotFound { .. } => AppError::not_found(err.to_string()),
            StorageError::InvalidBucketName { .. } | StorageError::InvalidObjectPath => {
                AppError::bad_request(err.to_string())
            }
            StorageError::ObjectExists { .. } => {
                AppError::new(StatusCode::CONFLICT, err.to_string())
            }
            StorageError::Io(err) => {
                tracing::error!(error = %err, "object storage failure");
                AppError::internal("Internal server error")
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}
