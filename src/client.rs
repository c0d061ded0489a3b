use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{StatusCode, header};
use serde_json::{Value, json};
use thiserror::Error;

use crate::{
    error::GENERIC_FAILURE,
    models::{LoginGrant, LoginRequest, SessionUser},
    session::{ACCESS_TOKEN_COOKIE, TOKEN_COOKIE},
};

const SESSION_EXPIRED: &str = "Your session has expired. Please log in again.";
const NOT_PERMITTED: &str = "You do not have permission to perform this action.";

/// ClientError
///
/// Every upstream failure funnels through here, so the 401/403 messages the
/// frontend shows are decided in exactly one place.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("Upstream unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected upstream payload: {0}")]
    Malformed(String),
}

/// Backend
///
/// The gateway's view of the upstream REST API. Handlers only see this trait,
/// which lets tests swap in a stub without a network.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `POST /api/auth/login`.
    async fn login(&self, credentials: &LoginRequest) -> Result<LoginGrant, ClientError>;
    /// `GET /api/auth/me` for the holder of `token`.
    async fn current_user(&self, token: &str) -> Result<SessionUser, ClientError>;
    /// Authenticated GET of any upstream path (e.g. `/api/services`).
    async fn fetch_json(&self, path: &str, token: &str) -> Result<Value, ClientError>;
}

pub type BackendState = Arc<dyn Backend>;

/// ApiClient
///
/// `reqwest` implementation of `Backend`, sharing the gateway's HTTP client.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder, token: &str) -> reqwest::RequestBuilder {
        request
            .bearer_auth(token)
            .header(header::COOKIE, format!("{}={}", TOKEN_COOKIE, token))
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn login(&self, credentials: &LoginRequest) -> Result<LoginGrant, ClientError> {
        let response = self
            .http
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": credentials.email, "password": credentials.password }))
            .send()
            .await?;

        // Some backends only hand the credential back as a cookie.
        let cookie_token = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(token_from_set_cookie);

        let body = read_body(response).await?;
        let payload = unwrap_data(&body);

        let token = ["token", "accessToken", "access_token"]
            .iter()
            .find_map(|key| payload.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .or(cookie_token)
            .ok_or_else(|| ClientError::Malformed("login response carries no token".into()))?;

        let user = payload
            .get("user")
            .cloned()
            .ok_or_else(|| ClientError::Malformed("login response carries no user".into()))?;

        Ok(LoginGrant {
            token,
            user: parse_user(user)?,
        })
    }

    async fn current_user(&self, token: &str) -> Result<SessionUser, ClientError> {
        let response = self
            .authorized(self.http.get(self.url("/api/auth/me")), token)
            .send()
            .await?;

        let body = read_body(response).await?;
        let payload = unwrap_data(&body);
        let user = payload.get("user").unwrap_or(payload).clone();

        parse_user(user)
    }

    async fn fetch_json(&self, path: &str, token: &str) -> Result<Value, ClientError> {
        let response = self
            .authorized(self.http.get(self.url(path)), token)
            .send()
            .await?;

        read_body(response).await
    }
}

/// Reads a response body, mapping non-success statuses to `ClientError`.
async fn read_body(response: reqwest::Response) -> Result<Value, ClientError> {
    let status = response.status();
    let bytes = response.bytes().await?;
    let body: Option<Value> = serde_json::from_slice(&bytes).ok();

    if status.is_success() {
        return body.ok_or_else(|| {
            ClientError::Malformed(format!("{} returned a non-JSON body", status))
        });
    }

    let message = body.as_ref().and_then(upstream_message);
    Err(match status {
        StatusCode::UNAUTHORIZED => {
            ClientError::Unauthorized(message.unwrap_or_else(|| SESSION_EXPIRED.to_string()))
        }
        StatusCode::FORBIDDEN => {
            ClientError::Forbidden(message.unwrap_or_else(|| NOT_PERMITTED.to_string()))
        }
        _ => ClientError::Rejected {
            status,
            message: message.unwrap_or_else(|| GENERIC_FAILURE.to_string()),
        },
    })
}

/// The server's own explanation, if it gave one.
pub fn upstream_message(body: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .filter(|message| !message.trim().is_empty())
        .map(str::to_string)
}

/// Upstream payloads are either bare or wrapped as `{ "data": ... }`.
pub fn unwrap_data(body: &Value) -> &Value {
    match body.get("data") {
        Some(inner) if !inner.is_null() => inner,
        _ => body,
    }
}

fn parse_user(value: Value) -> Result<SessionUser, ClientError> {
    serde_json::from_value(value).map_err(|e| ClientError::Malformed(e.to_string()))
}

fn token_from_set_cookie(raw: &str) -> Option<String> {
    let (name, rest) = raw.split_once('=')?;
    let name = name.trim();
    if name != TOKEN_COOKIE && name != ACCESS_TOKEN_COOKIE {
        return None;
    }
    let value = rest.split(';').next()?.trim();
    (!value.is_empty()).then(|| value.to_string())
}
