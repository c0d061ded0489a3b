use crate::{AppState, proxy};
use axum::{Router, routing::any};

/// API Router Module
///
/// Every method on `/api/*` is relayed to the upstream backend unchanged.
pub fn api_routes() -> Router<AppState> {
    Router::new().route("/api/{*path}", any(proxy::forward))
}
