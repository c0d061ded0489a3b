use std::time::Duration;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{
        HeaderMap, HeaderValue, header,
        header::InvalidHeaderValue,
        request::Parts,
    },
};
use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::{AppConfig, RoleAuthority},
    error::AppError,
    models::SessionUser,
};

// --- Cookie Names ---

/// Upstream credential. `access_token` is accepted as an alias.
pub const TOKEN_COOKIE: &str = "token";
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
/// Client-readable, percent-encoded JSON `SessionUser`.
pub const USER_COOKIE: &str = "user";
/// Gateway-signed session token carrying the authoritative role claim.
pub const SESSION_COOKIE: &str = "session";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No active session")]
    Missing,

    #[error("Session record is corrupt")]
    CorruptUserCookie,

    #[error("Session has expired")]
    Expired,

    #[error("Session token rejected: {0}")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    #[error("Failed to sign session token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("Cookie cannot be sent as a header: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
}

/// SessionCookies
///
/// The session-relevant cookies of one request. Empty values count as absent,
/// so a cleared `token=` cookie does not authenticate anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionCookies {
    pub token: Option<String>,
    pub user: Option<String>,
    pub session: Option<String>,
}

impl SessionCookies {
    /// Collects cookies from every `Cookie` header. The first occurrence of a
    /// name wins.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = Self::default();

        for value in headers.get_all(header::COOKIE) {
            let Ok(raw) = value.to_str() else {
                continue;
            };
            for pair in raw.split(';') {
                let Some((name, value)) = pair.trim().split_once('=') else {
                    continue;
                };
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }
                let slot = match name.trim() {
                    TOKEN_COOKIE | ACCESS_TOKEN_COOKIE => &mut cookies.token,
                    USER_COOKIE => &mut cookies.user,
                    SESSION_COOKIE => &mut cookies.session,
                    _ => continue,
                };
                slot.get_or_insert_with(|| value.to_string());
            }
        }

        cookies
    }
}

impl SessionUser {
    /// Decodes the `user` cookie. Browsers may hand the value back raw or
    /// percent-encoded; both forms are accepted.
    pub fn from_cookie(raw: &str) -> Result<Self, SessionError> {
        if let Ok(user) = serde_json::from_str(raw) {
            return Ok(user);
        }
        let decoded = urlencoding::decode(raw).map_err(|_| SessionError::CorruptUserCookie)?;
        serde_json::from_str(&decoded).map_err(|_| SessionError::CorruptUserCookie)
    }

    pub fn to_cookie_value(&self) -> Result<String, SessionError> {
        let json = serde_json::to_string(self).map_err(|_| SessionError::CorruptUserCookie)?;
        Ok(urlencoding::encode(&json).into_owned())
    }
}

// --- Signed Session ---

/// SessionClaims
///
/// Payload of the gateway `session` token. The role claim here is the only one
/// the guard trusts when `ROLE_AUTHORITY=token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Upstream user id.
    pub sub: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
    pub iat: usize,
    pub exp: usize,
    pub jti: Uuid,
}

impl SessionClaims {
    pub fn user(&self) -> SessionUser {
        SessionUser {
            id: self.sub.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
            is_approved: self.approved,
        }
    }
}

/// SessionKeys
///
/// Signs and verifies session tokens, and builds the `Set-Cookie` values that
/// carry them. Built once from `AppConfig` and shared through `AppState`.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    secure: bool,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl: Duration, secure: bool) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
            secure,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.session_secret,
            config.session_ttl,
            config.is_production(),
        )
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user: &SessionUser) -> Result<String, SessionError> {
        let now = Utc::now().timestamp().max(0) as usize;
        let claims = SessionClaims {
            sub: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            approved: user.is_approved,
            iat: now,
            exp: now + self.ttl.as_secs() as usize,
            jti: Uuid::new_v4(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(SessionError::Signing)
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        decode::<SessionClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::InvalidToken(e),
            })
    }

    /// Cookies set after a successful login: upstream credential, user hint and
    /// signed session.
    pub fn login_cookies(
        &self,
        token: &str,
        user: &SessionUser,
    ) -> Result<Vec<HeaderValue>, SessionError> {
        let mut cookies = vec![self.cookie(TOKEN_COOKIE, token, true)?];
        cookies.extend(self.refresh_cookies(user)?);
        Ok(cookies)
    }

    /// Cookies re-issued when the user record is re-fetched. The upstream
    /// credential is left alone.
    pub fn refresh_cookies(&self, user: &SessionUser) -> Result<Vec<HeaderValue>, SessionError> {
        Ok(vec![
            self.cookie(USER_COOKIE, &user.to_cookie_value()?, false)?,
            self.cookie(SESSION_COOKIE, &self.issue(user)?, true)?,
        ])
    }

    fn cookie(&self, name: &str, value: &str, http_only: bool) -> Result<HeaderValue, SessionError> {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; SameSite=Lax",
            name,
            value,
            self.ttl.as_secs()
        );
        if http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        Ok(HeaderValue::from_str(&cookie)?)
    }
}

/// Expires every session cookie, including the `access_token` alias.
pub fn cleared_cookies() -> Vec<HeaderValue> {
    [
        "token=; Path=/; Max-Age=0; SameSite=Lax",
        "access_token=; Path=/; Max-Age=0; SameSite=Lax",
        "user=; Path=/; Max-Age=0; SameSite=Lax",
        "session=; Path=/; Max-Age=0; SameSite=Lax",
    ]
    .into_iter()
    .map(HeaderValue::from_static)
    .collect()
}

// --- Extractor ---

/// CurrentSession
///
/// The resolved session of a request: the single source of truth for "current
/// user" in every handler that needs one.
///
/// The upstream credential must be present. The identity comes from the
/// verified `session` token, or from the `user` cookie when the deployment runs
/// with `ROLE_AUTHORITY=cookie`.
///
/// Rejection: `401` with a `Notice` body.
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub user: SessionUser,
    pub token: String,
}

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
    SessionKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        let cookies = SessionCookies::from_headers(&parts.headers);

        let token = cookies.token.ok_or(SessionError::Missing)?;

        let user = match config.role_authority {
            RoleAuthority::SignedToken => {
                let keys = SessionKeys::from_ref(state);
                let raw = cookies.session.as_deref().ok_or(SessionError::Missing)?;
                keys.verify(raw)?.user()
            }
            RoleAuthority::UserCookie => {
                let raw = cookies.user.as_deref().ok_or(SessionError::Missing)?;
                SessionUser::from_cookie(raw)?
            }
        };

        Ok(CurrentSession { user, token })
    }
}
