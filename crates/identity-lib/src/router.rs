// ============================
// crates/identity-lib/src/router.rs
// ============================
//! HTTP routes.
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{self, sessions, users};
use crate::AppState;

/// Create the HTTP router
pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/users", post(users::register))
        .route("/users/me", get(users::me))
        .route("/users/{id}", get(users::get_user))
        .route("/sessions", post(sessions::login).delete(sessions::logout));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
