//! `/api/*` forwarding to the upstream REST backend.
//!
//! One inbound call maps to one upstream call. The whole exchange (send and
//! body read) runs under a single timer; when it fires the upstream future is
//! dropped and the caller gets a `504`.

use std::time::Duration;

use axum::{
    Json,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use serde::de::IgnoredAny;
use serde_json::{Value, json};
use thiserror::Error;

use crate::{AppState, config::Env};

/// Length of the raw-body excerpt attached to a malformed-JSON failure.
pub const EXCERPT_CHARS: usize = 200;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Upstream request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Upstream service is unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("Upstream returned an invalid JSON response")]
    MalformedJson { status: StatusCode, excerpt: String },

    #[error("{0}")]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ProxyError {
    /// Renders the failure. Diagnostic detail is only exposed outside
    /// production.
    pub fn render(self, env: Env) -> Response {
        match self {
            ProxyError::Timeout(bound) => {
                tracing::warn!(?bound, "upstream timed out");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    Json(json!({ "success": false, "message": "Upstream request timed out" })),
                )
                    .into_response()
            }
            ProxyError::Unreachable(e) => {
                tracing::warn!(error = %e, "upstream unreachable");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({ "success": false, "message": "Upstream service is unreachable" })),
                )
                    .into_response()
            }
            ProxyError::MalformedJson { status, excerpt } => {
                tracing::warn!(%status, "upstream sent malformed JSON");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({
                        "success": false,
                        "message": "Upstream returned an invalid JSON response",
                        "upstreamStatus": status.as_u16(),
                        "raw": excerpt,
                    })),
                )
                    .into_response()
            }
            ProxyError::Internal(e) => {
                tracing::error!(error = %e, "proxy failure");
                let mut body = json!({ "success": false, "message": e.to_string() });
                if env != Env::Production {
                    body["detail"] = Value::String(format!("{:?}", e));
                }
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

/// Methods whose body is forwarded.
fn carries_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

pub fn upstream_url(base: &str, path: &str, query: Option<&str>) -> String {
    let mut url = format!("{}/api/{}", base.trim_end_matches('/'), path);
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(query);
    }
    url
}

/// First `EXCERPT_CHARS` characters of a body, lossily decoded.
pub fn excerpt(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).chars().take(EXCERPT_CHARS).collect()
}

fn is_json(content_type: Option<&HeaderValue>) -> bool {
    content_type
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_ascii_lowercase())
        .is_some_and(|value| value.contains("application/json") || value.contains("+json"))
}

struct UpstreamReply {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

/// forward
///
/// `ANY /api/{*path}`. The path and query are forwarded exactly as received,
/// percent-encoding included.
pub async fn forward(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let env = state.config.env;
    let path = uri.path().strip_prefix("/api/").unwrap_or_default();
    match relay(&state, path, uri.query(), method, &headers, body).await {
        Ok(response) => response,
        Err(e) => e.render(env),
    }
}

async fn relay(
    state: &AppState,
    path: &str,
    query: Option<&str>,
    method: Method,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let url = upstream_url(&state.config.api_base_url, path, query);
    tracing::debug!(%method, %url, "forwarding");

    let mut request = state.http.request(method.clone(), &url);
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        request = request.header(header::AUTHORIZATION, value.clone());
    }
    // HTTP/2 clients may split cookies over several headers.
    let cookies: Vec<&str> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();
    if !cookies.is_empty() {
        request = request.header(header::COOKIE, cookies.join("; "));
    }
    if carries_body(&method) && !body.is_empty() {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("application/json"));
        request = request.header(header::CONTENT_TYPE, content_type).body(body);
    }

    let bound = state.config.proxy_timeout;
    let exchange = async {
        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok::<_, reqwest::Error>(UpstreamReply {
            status,
            headers,
            body,
        })
    };

    let reply = match tokio::time::timeout(bound, exchange).await {
        Err(_) => return Err(ProxyError::Timeout(bound)),
        Ok(Err(e)) if e.is_connect() => return Err(ProxyError::Unreachable(e)),
        Ok(Err(e)) if e.is_timeout() => return Err(ProxyError::Timeout(bound)),
        Ok(Err(e)) => return Err(ProxyError::Internal(Box::new(e))),
        Ok(Ok(reply)) => reply,
    };

    into_response(reply)
}

fn into_response(reply: UpstreamReply) -> Result<Response, ProxyError> {
    let UpstreamReply {
        status,
        headers,
        body,
    } = reply;
    let content_type = headers.get(header::CONTENT_TYPE);

    if !body.is_empty() && is_json(content_type) {
        serde_json::from_slice::<IgnoredAny>(&body).map_err(|_| ProxyError::MalformedJson {
            status,
            excerpt: excerpt(&body),
        })?;
    }

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    let relayed = response.headers_mut();
    if let Some(content_type) = content_type {
        relayed.insert(header::CONTENT_TYPE, content_type.clone());
    }
    for value in headers.get_all(header::SET_COOKIE) {
        relayed.append(header::SET_COOKIE, value.clone());
    }
    if let Some(cache_control) = headers.get(header::CACHE_CONTROL) {
        relayed.insert(header::CACHE_CONTROL, cache_control.clone());
    }

    Ok(response)
}
