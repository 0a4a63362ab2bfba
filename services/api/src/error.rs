//! Custom error types for the API service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::models::{conversation::ChatAccessError, match_request::MatchError};

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or invalid credentials
    #[error("Unauthorized")]
    Unauthorized,

    /// Semantically invalid input, reported against one field
    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// The caller may not perform this action
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Referenced entity does not exist (or is not visible to the caller)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error
    #[error("Internal server error")]
    InternalServerError,

    /// Pool or migration failure
    #[error("Database error: {0}")]
    Database(#[from] common::error::DatabaseError),

    /// Query failure
    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),
}

impl ApiError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{} not found", what))
    }

    /// Log an unexpected failure and hide it behind a 500
    pub fn internal(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        ApiError::InternalServerError
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InternalServerError | ApiError::Database(_) | ApiError::Query(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<MatchError> for ApiError {
    fn from(e: MatchError) -> Self {
        match e {
            MatchError::NotRecipient => ApiError::Forbidden(e.to_string()),
            MatchError::SelfRequest
            | MatchError::AlreadyMatched
            | MatchError::DuplicatePending
            | MatchError::IncomingPending => ApiError::validation("recipient_id", e.to_string()),
        }
    }
}

impl From<ChatAccessError> for ApiError {
    fn from(e: ChatAccessError) -> Self {
        ApiError::Forbidden(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            ApiError::Unauthorized => json!({ "error": "Unauthorized" }),
            ApiError::Validation { field, message } => json!({
                "error": message,
                "field": field,
            }),
            ApiError::Forbidden(msg) | ApiError::NotFound(msg) => {
                json!({ "error": msg })
            }
            ApiError::InternalServerError => json!({ "error": "Internal server error" }),
            ApiError::Database(e) => {
                error!("Database error: {}", e);
                json!({ "error": "Internal server error" })
            }
            ApiError::Query(e) => {
                error!("Query error: {}", e);
                json!({ "error": "Internal server error" })
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
