// ============================
// crates/identity-lib/src/handlers/mod.rs
// ============================
//! HTTP handlers and the extractors they share.
use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts, Json};
use campus_identity_common::HealthResponse;

use crate::context::RequestContext;
use crate::error::AppError;
use crate::AppState;

pub mod sessions;
pub mod users;

/// Header whose value becomes the correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 128;

/// Per-request context: correlation id from `x-request-id` (or a fresh one)
/// and the configured request timeout as deadline.
///
/// Cancellation needs no wiring here: axum drops the handler future when the
/// client goes away.
#[derive(Debug, Clone)]
pub struct RequestCtx(pub RequestContext);

impl FromRequestParts<Arc<AppState>> for RequestCtx {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let mut ctx = RequestContext::background().with_timeout(state.settings.request_timeout());

        let request_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN);
        if let Some(id) = request_id {
            ctx = ctx.with_correlation_id(id);
        }

        Ok(Self(ctx))
    }
}

/// Token from an `Authorization: Bearer <token>` header
#[derive(Clone)]
pub struct BearerToken(pub String);

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthenticated("missing bearer token".to_string()))?;

        parse_bearer(header)
            .map(|token| Self(token.to_string()))
            .ok_or_else(|| AppError::Unauthenticated("malformed authorization header".to_string()))
    }
}

/// Split `Bearer <token>`; the scheme is case-insensitive
fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
