// crates/identity-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use campus_identity_common::{ErrorBody, ErrorDetail};
use thiserror::Error;

use crate::auth::TokenError;

/// Non-standard "client closed request" status used for cancelled requests
const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("User already exists")]
    AlreadyExists,

    /// Shared by "no such user" and "wrong password" so callers cannot tell them apart
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    /// Authenticated, but not allowed to touch the resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Password hashing failed: {0}")]
    HashingFailure(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::AlreadyExists => StatusCode::CONFLICT,
            AppError::InvalidCredentials
            | AppError::Unauthenticated(_)
            | AppError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Cancelled => StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                .unwrap_or(StatusCode::REQUEST_TIMEOUT),
            AppError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "VAL_001",
            AppError::AlreadyExists => "USER_001",
            AppError::InvalidCredentials => "AUTH_001",
            AppError::Unauthenticated(_) => "AUTH_002",
            AppError::InvalidToken(_) => "AUTH_003",
            AppError::Forbidden(_) => "AUTH_004",
            AppError::NotFound(_) => "NF_001",
            AppError::HashingFailure(_) => "HASH_001",
            AppError::Store(_) => "STORE_001",
            AppError::Io(_) => "STORE_002",
            AppError::Json(_) => "STORE_003",
            AppError::Cancelled => "REQ_001",
            AppError::DeadlineExceeded => "REQ_002",
            AppError::Config(_) => "CFG_001",
            AppError::Internal(_) => "INT_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::InvalidInput(_) => "Invalid input provided".to_string(),
            AppError::AlreadyExists => "User already exists".to_string(),
            AppError::InvalidCredentials => "Invalid credentials".to_string(),
            AppError::Unauthenticated(_) | AppError::InvalidToken(_) => {
                "Authentication failed".to_string()
            },
            AppError::Forbidden(_) => "Access denied".to_string(),
            AppError::NotFound(_) => "Resource not found".to_string(),
            AppError::Cancelled => "Request cancelled".to_string(),
            AppError::DeadlineExceeded => "Request timed out".to_string(),
            AppError::HashingFailure(_)
            | AppError::Store(_)
            | AppError::Io(_)
            | AppError::Json(_)
            | AppError::Config(_)
            | AppError::Internal(_) => "An internal server error occurred".to_string(),
        }
    }

    /// Infrastructure faults, as opposed to caller mistakes
    pub fn is_internal(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if self.is_internal() {
            tracing::error!(code = self.error_code(), "request failed: {}", self);
        }

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message,
            },
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("background task failed: {err}"))
    }
}

impl From<figment::Error> for AppError {
    fn from(err: figment::Error) -> Self {
        AppError::Config(err.to_string())
    }
}
