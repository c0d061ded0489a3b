use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that work without a session.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /session/login
        // Exchanges credentials upstream for the session cookies.
        .route("/session/login", post(handlers::login))
        // POST /session/logout
        // Expires the session cookies. Safe to call without a session.
        .route("/session/logout", post(handlers::logout))
}
