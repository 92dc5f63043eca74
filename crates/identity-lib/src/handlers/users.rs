//! Registration and profile endpoints.
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use campus_identity_common::{RegisterRequest, RegisterResponse, UserProfile};

use super::{BearerToken, RequestCtx};
use crate::error::AppError;
use crate::AppState;

/// `POST /api/v1/users`
pub async fn register(
    State(state): State<Arc<AppState>>,
    RequestCtx(ctx): RequestCtx,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let Json(req) = payload.map_err(|e| AppError::InvalidInput(e.body_text()))?;
    let user_id = state.auth.register(&ctx, req).await?;
    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id })))
}

/// `GET /api/v1/users/me`
pub async fn me(
    State(state): State<Arc<AppState>>,
    RequestCtx(ctx): RequestCtx,
    BearerToken(token): BearerToken,
) -> Result<Json<UserProfile>, AppError> {
    let profile = state.auth.get_info_by_token(&ctx, &token).await?;
    Ok(Json(profile))
}

/// `GET /api/v1/users/{id}`: callers may only read their own profile
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    RequestCtx(ctx): RequestCtx,
    BearerToken(token): BearerToken,
    Path(user_id): Path<String>,
) -> Result<Json<UserProfile>, AppError> {
    let claims = state.auth.authenticate(&ctx, &token).await?;
    if claims.sub != user_id {
        return Err(AppError::Forbidden(
            "token subject does not match requested user".to_string(),
        ));
    }
    let profile = state.auth.get_info_by_id(&ctx, &user_id).await?;
    Ok(Json(profile))
}
