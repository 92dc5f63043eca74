//! Login and logout endpoints.
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use campus_identity_common::{LoginRequest, LoginResponse, TOKEN_TYPE_BEARER};

use super::{BearerToken, RequestCtx};
use crate::error::AppError;
use crate::AppState;

/// `POST /api/v1/sessions`
pub async fn login(
    State(state): State<Arc<AppState>>,
    RequestCtx(ctx): RequestCtx,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(req) = payload.map_err(|e| AppError::InvalidInput(e.body_text()))?;
    let session = state.auth.login(&ctx, req).await?;
    Ok(Json(LoginResponse {
        token: session.token,
        token_type: TOKEN_TYPE_BEARER.to_string(),
        user_id: session.user_id,
        expires_at: session.expires_at,
    }))
}

/// `DELETE /api/v1/sessions`
pub async fn logout(
    State(state): State<Arc<AppState>>,
    RequestCtx(ctx): RequestCtx,
    BearerToken(token): BearerToken,
) -> Result<StatusCode, AppError> {
    state.auth.logout(&ctx, &token).await?;
    Ok(StatusCode::NO_CONTENT)
}
