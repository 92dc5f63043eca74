use async_trait::async_trait;
use campus_identity_common::{LoginRequest, RegisterRequest, UserProfile};

use super::Claims;
use crate::context::RequestContext;
use crate::error::AppError;

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub user_id: String,
    /// Unix timestamp (seconds)
    pub expires_at: i64,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Create a user and return its identifier
    async fn register(&self, ctx: &RequestContext, req: RegisterRequest) -> Result<String, AppError>;

    /// Check credentials and issue a session token
    async fn login(&self, ctx: &RequestContext, req: LoginRequest) -> Result<IssuedSession, AppError>;

    /// Validate a bearer token, returning its claims
    async fn authenticate(&self, ctx: &RequestContext, token: &str) -> Result<Claims, AppError>;

    async fn get_info_by_token(&self, ctx: &RequestContext, token: &str) -> Result<UserProfile, AppError>;

    /// Profile lookup for an identifier already authenticated upstream
    async fn get_info_by_id(&self, ctx: &RequestContext, user_id: &str) -> Result<UserProfile, AppError>;

    /// Revoke the session behind `token`
    async fn logout(&self, ctx: &RequestContext, token: &str) -> Result<(), AppError>;
}
