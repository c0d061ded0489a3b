//! Route guard and role authorizer.
//!
//! Every page navigation is classified by static prefix matching and then
//! decided from the request's cookies alone. The decision is a pure function
//! (`evaluate`); `route_guard` is the thin axum middleware applying it.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    AppState,
    config::RoleAuthority,
    models::{Role, SessionUser},
    session::{SessionCookies, SessionKeys},
};

pub const LOGIN_PATH: &str = "/auth/login";
pub const HOME_PATH: &str = "/";
pub const PENDING_APPROVAL_PATH: &str = "/provider/pending";

/// Reachable without a session. `/` is matched exactly; every other entry also
/// covers its sub-paths.
const PUBLIC_PATHS: &[&str] = &[
    "/auth/login",
    "/auth/register",
    "/services",
    "/price-lists",
    "/admin/login",
    // Frontend bundle assets.
    "/assets",
    "/favicon.ico",
    "/robots.txt",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    Protected,
    RoleScoped(Role),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Continue,
    RedirectToLogin,
    RedirectHome,
    RedirectPendingApproval,
}

/// Where the declared role of a request comes from.
#[derive(Clone, Copy)]
pub enum RoleSource<'a> {
    /// The client-readable `user` cookie.
    UserCookie,
    /// The verified claims of the gateway-signed `session` cookie.
    SignedSession(&'a SessionKeys),
}

impl<'a> RoleSource<'a> {
    pub fn new(authority: RoleAuthority, keys: &'a SessionKeys) -> Self {
        match authority {
            RoleAuthority::SignedToken => RoleSource::SignedSession(keys),
            RoleAuthority::UserCookie => RoleSource::UserCookie,
        }
    }
}

/// `path` equals `prefix` or lies beneath it. `/adminx` is not under `/admin`.
fn is_under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Resolves a request path the way the static file service does: percent
/// decoding, then dropping empty and `.` segments and applying `..`. `None`
/// when the decoded path is not UTF-8.
pub fn normalize_path(raw: &str) -> Option<String> {
    let decoded = urlencoding::decode(raw).ok()?;
    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    Some(format!("/{}", segments.join("/")))
}

pub fn classify(path: &str) -> RouteClass {
    if path == HOME_PATH || PUBLIC_PATHS.iter().any(|prefix| is_under(path, prefix)) {
        return RouteClass::Public;
    }

    Role::ALL
        .into_iter()
        .find(|role| is_under(path, role.namespace()))
        .map_or(RouteClass::Protected, RouteClass::RoleScoped)
}

/// evaluate
///
/// Decides one navigation. The path is normalized first; a path that does not
/// decode is treated as protected.
///
/// 1. Public paths always continue, whatever the cookies say.
/// 2. Without a session token the request goes to the login page. No return
///    URL is attached.
/// 3. A `user` cookie that does not decode is an unauthenticated session.
/// 4. On a role-scoped path the declared role must match the namespace, or the
///    request goes home. With a signed session, a missing or invalid `session`
///    cookie is unauthenticated. A provider explicitly marked unapproved is
///    held on the pending-approval page.
pub fn evaluate(path: &str, cookies: &SessionCookies, source: RoleSource<'_>) -> GuardDecision {
    let normalized = normalize_path(path);
    let class = normalized.as_deref().map_or(RouteClass::Protected, classify);
    let path = normalized.as_deref().unwrap_or(path);
    if class == RouteClass::Public {
        return GuardDecision::Continue;
    }

    if cookies.token.is_none() {
        return GuardDecision::RedirectToLogin;
    }

    let hint = match cookies.user.as_deref().map(SessionUser::from_cookie) {
        Some(Ok(user)) => Some(user),
        Some(Err(_)) => return GuardDecision::RedirectToLogin,
        None => None,
    };

    let RouteClass::RoleScoped(expected) = class else {
        return GuardDecision::Continue;
    };

    let declared = match source {
        RoleSource::UserCookie => hint,
        RoleSource::SignedSession(keys) => {
            match cookies.session.as_deref().map(|raw| keys.verify(raw)) {
                Some(Ok(claims)) => Some(claims.user()),
                _ => return GuardDecision::RedirectToLogin,
            }
        }
    };

    let Some(user) = declared else {
        return GuardDecision::Continue;
    };

    match user.role() {
        Some(role) if role != expected => GuardDecision::RedirectHome,
        None => GuardDecision::RedirectHome,
        Some(Role::Provider)
            if user.is_approved == Some(false) && !is_under(path, PENDING_APPROVAL_PATH) =>
        {
            GuardDecision::RedirectPendingApproval
        }
        Some(_) => GuardDecision::Continue,
    }
}

/// route_guard
///
/// Middleware wrapping every page route and the static fallback.
pub async fn route_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let cookies = SessionCookies::from_headers(request.headers());
    let source = RoleSource::new(state.config.role_authority, &state.keys);
    let path = request.uri().path();

    let decision = evaluate(path, &cookies, source);
    tracing::debug!(path, ?decision, "route guard");

    match decision {
        GuardDecision::Continue => next.run(request).await,
        GuardDecision::RedirectToLogin => Redirect::temporary(LOGIN_PATH).into_response(),
        GuardDecision::RedirectHome => Redirect::temporary(HOME_PATH).into_response(),
        GuardDecision::RedirectPendingApproval => {
            Redirect::temporary(PENDING_APPROVAL_PATH).into_response()
        }
    }
}
