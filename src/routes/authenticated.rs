use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Session endpoints called by the frontend with `fetch`. Every handler takes a
/// `CurrentSession`, so a missing or invalid session is a `401` JSON notice
/// rather than a redirect.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        // GET /session
        // The current user, resolved from the verified session.
        .route("/session", get(handlers::get_session))
        // POST /session/refresh
        // Re-fetches the user upstream and re-issues the session cookies.
        .route("/session/refresh", post(handlers::refresh_session))
}
