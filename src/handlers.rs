use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    AppState,
    client::ClientError,
    dashboard,
    error::AppError,
    guard::{HOME_PATH, PENDING_APPROVAL_PATH},
    models::{DashboardSummary, LoginRequest, LoginResponse, Notice, Role, SessionUser},
    session::{CurrentSession, cleared_cookies},
};

fn set_cookies(values: impl IntoIterator<Item = header::HeaderValue>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for value in values {
        headers.append(header::SET_COOKIE, value);
    }
    headers
}

/// Accepts only same-site absolute paths, so `?redirect=` cannot bounce the
/// browser to another origin.
pub fn sanitize_redirect(requested: Option<&str>) -> Option<String> {
    let path = requested?.trim();
    let same_site = path.starts_with('/') && !path.starts_with("//") && !path.contains('\\');
    same_site.then(|| path.to_string())
}

/// Landing page for a freshly authenticated user.
pub fn landing_path(user: &SessionUser) -> String {
    match user.role() {
        Some(Role::Provider) if user.is_approved == Some(false) => PENDING_APPROVAL_PATH.to_string(),
        Some(role) => role.home_path(),
        None => HOME_PATH.to_string(),
    }
}

// --- Session Handlers ---

/// login
///
/// [Public Route] Authenticates against the upstream backend and establishes
/// the three session cookies.
#[utoipa::path(
    post,
    path = "/session/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Rejected credentials", body = Notice)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let grant = state.backend.login(&payload).await?;
    let cookies = state.keys.login_cookies(&grant.token, &grant.user)?;

    let redirect = sanitize_redirect(payload.redirect.as_deref())
        .unwrap_or_else(|| landing_path(&grant.user));

    tracing::info!(user = %grant.user.id, role = %grant.user.role, "session established");

    Ok((
        set_cookies(cookies),
        Json(LoginResponse {
            success: true,
            user: grant.user,
            redirect,
        }),
    ))
}

/// logout
///
/// [Public Route] Expires every session cookie. Idempotent.
#[utoipa::path(
    post,
    path = "/session/logout",
    responses((status = 204, description = "Logged out"))
)]
pub async fn logout() -> impl IntoResponse {
    (StatusCode::NO_CONTENT, set_cookies(cleared_cookies()))
}

/// get_session
///
/// [Authenticated Route] The current user as the gateway sees it.
#[utoipa::path(
    get,
    path = "/session",
    responses(
        (status = 200, description = "Current session", body = SessionUser),
        (status = 401, description = "No session", body = Notice)
    )
)]
pub async fn get_session(session: CurrentSession) -> Json<SessionUser> {
    Json(session.user)
}

/// refresh_session
///
/// [Authenticated Route] Re-fetches the user record upstream and re-issues the
/// `user` and `session` cookies from it. Running it twice yields the same
/// session. If upstream no longer accepts the credential, the cookies are
/// cleared.
#[utoipa::path(
    post,
    path = "/session/refresh",
    responses(
        (status = 200, description = "Refreshed", body = SessionUser),
        (status = 401, description = "Session revoked upstream", body = Notice)
    )
)]
pub async fn refresh_session(
    State(state): State<AppState>,
    session: CurrentSession,
) -> Result<Response, AppError> {
    match state.backend.current_user(&session.token).await {
        Ok(user) => {
            let cookies = state.keys.refresh_cookies(&user)?;
            Ok((set_cookies(cookies), Json(user)).into_response())
        }
        Err(ClientError::Unauthorized(message)) => Ok((
            StatusCode::UNAUTHORIZED,
            set_cookies(cleared_cookies()),
            Json(Notice::failure(message)),
        )
            .into_response()),
        Err(e) => Err(e.into()),
    }
}

// --- Dashboard Handlers ---

/// dashboard_summary
///
/// [Role Route] Aggregated counts for the dashboard of `role`.
///
/// *Authorization*: the guard has already matched the namespace; the handler
/// re-checks the session role so the route stays safe if mounted elsewhere.
#[utoipa::path(
    get,
    path = "/{role}/dashboard/summary",
    params(("role" = String, Path, description = "admin | provider | customer")),
    responses(
        (status = 200, description = "Summary", body = DashboardSummary),
        (status = 403, description = "Role mismatch", body = Notice),
        (status = 404, description = "Unknown role", body = Notice)
    )
)]
pub async fn dashboard_summary(
    State(state): State<AppState>,
    session: CurrentSession,
    Path(role): Path<String>,
) -> Result<Json<DashboardSummary>, AppError> {
    let role = Role::parse(&role).ok_or_else(|| AppError::NotFound(format!("No dashboard for '{}'", role)))?;

    if session.user.role() != Some(role) {
        return Err(AppError::Forbidden(
            "You do not have access to this dashboard.".to_string(),
        ));
    }

    let summary = dashboard::summarize(state.backend.as_ref(), role, &session.token).await?;
    Ok(Json(summary))
}

/// dashboard_home
///
/// [Authenticated Route] `/dashboard` resolves to the caller's role dashboard.
pub async fn dashboard_home(session: CurrentSession) -> Redirect {
    Redirect::temporary(&landing_path(&session.user))
}
