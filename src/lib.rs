use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod client;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod models;
pub mod proxy;
pub mod session;

// Routers grouped by protection: public, authenticated, guarded pages, api.
pub mod routes;
use routes::{api, authenticated, pages, public};

// --- Public Re-exports ---

pub use client::{ApiClient, Backend, BackendState};
pub use config::AppConfig;
pub use session::SessionKeys;

/// ApiDoc
///
/// OpenAPI document for the gateway-owned endpoints, served at
/// `/api-docs/openapi.json`. The forwarded `/api/*` surface belongs to the
/// upstream backend and is not described here.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::logout, handlers::get_session,
        handlers::refresh_session, handlers::dashboard_summary,
    ),
    components(
        schemas(
            models::Role, models::SessionUser, models::LoginRequest, models::LoginResponse,
            models::DashboardCount, models::DashboardSummary, models::Notice,
        )
    ),
    tags(
        (name = "marketplace-portal", description = "Marketplace session gateway")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, immutable container shared by every request.
#[derive(Clone)]
pub struct AppState {
    /// Upstream REST API used by the gateway's own handlers.
    pub backend: BackendState,
    /// Session token signing keys and cookie policy.
    pub keys: SessionKeys,
    /// Shared HTTP client for the proxy.
    pub http: reqwest::Client,
    pub config: AppConfig,
}

impl AppState {
    /// Builds the production wiring: one `reqwest` client shared by the proxy
    /// and the `ApiClient` backend.
    pub fn new(config: AppConfig) -> Self {
        let http = reqwest::Client::new();
        let backend = std::sync::Arc::new(ApiClient::new(http.clone(), &config.api_base_url));
        Self::with_backend(config, backend, http)
    }

    pub fn with_backend(config: AppConfig, backend: BackendState, http: reqwest::Client) -> Self {
        Self {
            backend,
            keys: SessionKeys::from_config(&config),
            http,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for SessionKeys {
    fn from_ref(app_state: &AppState) -> SessionKeys {
        app_state.keys.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routing structure, applies the guard to page routes only, and
/// wraps everything in the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .merge(api::api_routes())
        // Page routes carry the route guard and the static fallback.
        .merge(pages::page_routes(state.clone()))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one request, correlated by its `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
