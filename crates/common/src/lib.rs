// ======================
// crates/common/src/lib.rs
// ======================
//! Common types and structures
//! used for communication between identity clients and the identity service.
//! This module defines the request/response bodies of the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token type reported alongside every issued session token
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Body of a registration request
/// # Fields
/// * `email` - Unique email address, stored case-sensitively
/// * `password` - Plaintext password, hashed before storage
/// * `nickname` - Display name
/// * `avatar` - Avatar reference (URL or object key), may be empty
#[derive(Serialize, Deserialize, Clone)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub nickname: String,
    #[serde(default)]
    pub avatar: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("nickname", &self.nickname)
            .field("avatar", &self.avatar)
            .finish()
    }
}

/// Response to a successful registration
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RegisterResponse {
    /// Identifier of the newly created user
    pub user_id: String,
}

/// Body of a login request
#[derive(Serialize, Deserialize, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Response to a successful login
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginResponse {
    /// Signed session token
    pub token: String,
    /// Always [`TOKEN_TYPE_BEARER`]
    pub token_type: String,
    /// Subject the token was issued for
    pub user_id: String,
    /// Expiry as a Unix timestamp (seconds)
    pub expires_at: i64,
}

/// Public view of a user record. Never carries the password hash.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: String,
    pub email: String,
    pub nickname: String,
    pub avatar: String,
    pub created_at: DateTime<Utc>,
}

/// Error envelope returned by every failing endpoint
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Stable error code plus a human readable message
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Health check response
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthResponse {
    pub status: String,
}
