use crate::{AppState, guard, handlers};
use axum::{Router, middleware, routing::get};
use std::path::Path;
use tower_http::services::{ServeDir, ServeFile};

/// Page Router Module
///
/// Every browser navigation lands here. One parametrized route set serves all
/// three roles; the role namespace in the path is what the guard checks.
///
/// Paths without a dedicated route fall through to the static frontend bundle,
/// still behind the guard. Client-routed pages with no file of their own get
/// the bundle's `index.html`.
pub fn page_routes(state: AppState) -> Router<AppState> {
    let root = Path::new(&state.config.static_dir);
    let bundle = ServeDir::new(root).fallback(ServeFile::new(root.join("index.html")));

    Router::new()
        // GET /dashboard
        // Redirects to the caller's role dashboard.
        .route("/dashboard", get(handlers::dashboard_home))
        // GET /{role}/dashboard/summary
        // Counts aggregated from the upstream endpoints of that role.
        .route("/{role}/dashboard/summary", get(handlers::dashboard_summary))
        .fallback_service(bundle)
        .layer(middleware::from_fn_with_state(state, guard::route_guard))
}
