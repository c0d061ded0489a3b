use axum::{
    Json, Router,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use marketplace_portal::{
    ApiClient, Backend,
    client::{ClientError, unwrap_data, upstream_message},
    models::LoginRequest,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

// --- Fake Upstream ---

async fn login(Json(body): Json<Value>) -> Response {
    match body["email"].as_str() {
        Some("wrapped@example.com") => Json(json!({
            "success": true,
            "data": {
                "accessToken": "wrapped-token",
                "user": { "_id": "2", "name": "Wren", "role": "provider", "isApproved": false }
            }
        }))
        .into_response(),
        Some("cookie@example.com") => {
            let mut response = Json(json!({
                "user": { "_id": "3", "role": "customer" }
            }))
            .into_response();
            response.headers_mut().append(
                header::SET_COOKIE,
                HeaderValue::from_static("theme=dark; Path=/"),
            );
            response.headers_mut().append(
                header::SET_COOKIE,
                HeaderValue::from_static("token=cookie-token; Path=/; HttpOnly"),
            );
            response
        }
        Some("bare@example.com") => Json(json!({
            "token": "bare-token",
            "user": { "_id": "1", "role": "admin" }
        }))
        .into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": "Invalid email or password" })),
        )
            .into_response(),
    }
}

async fn me(headers: HeaderMap) -> Response {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let cookie = headers.get(header::COOKIE).and_then(|v| v.to_str().ok());

    if bearer == Some("Bearer good") && cookie == Some("token=good") {
        Json(json!({ "data": { "user": { "_id": "9", "name": "Mo", "role": "customer" } } }))
            .into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn spawn_upstream() -> String {
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route(
            "/api/admin/stats",
            get(|| async { (StatusCode::FORBIDDEN, Json(json!({ "message": "" }))) }),
        )
        .route(
            "/api/flaky",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": "Maintenance" }))) }),
        )
        .route("/api/html", get(|| async { "<html>oops</html>" }));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://127.0.0.1:{}/", port)
}

fn credentials(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
        redirect: None,
    }
}

// --- Pure Helpers ---

#[test]
fn test_upstream_message_and_data_unwrapping() {
    assert_eq!(
        upstream_message(&json!({ "message": "Nope" })).as_deref(),
        Some("Nope")
    );
    assert_eq!(
        upstream_message(&json!({ "error": "Broken" })).as_deref(),
        Some("Broken")
    );
    assert_eq!(upstream_message(&json!({ "message": "  " })), None);

    assert_eq!(unwrap_data(&json!({ "data": [1] })), &json!([1]));
    assert_eq!(unwrap_data(&json!({ "data": null, "x": 1 })), &json!({ "data": null, "x": 1 }));
}

// --- Login ---

#[tokio::test]
async fn test_login_accepts_every_token_shape() {
    let client = ApiClient::new(reqwest::Client::new(), &spawn_upstream().await);

    let bare = client.login(&credentials("bare@example.com", "pw")).await.unwrap();
    assert_eq!(bare.token, "bare-token");
    assert_eq!(bare.user.role, "admin");

    let wrapped = client.login(&credentials("wrapped@example.com", "pw")).await.unwrap();
    assert_eq!(wrapped.token, "wrapped-token");
    assert_eq!(wrapped.user.is_approved, Some(false));

    let cookie = client.login(&credentials("cookie@example.com", "pw")).await.unwrap();
    assert_eq!(cookie.token, "cookie-token");
    assert_eq!(cookie.user.id, "3");
}

#[tokio::test]
async fn test_login_rejection_keeps_upstream_message() {
    let client = ApiClient::new(reqwest::Client::new(), &spawn_upstream().await);

    let err = client
        .login(&credentials("nobody@example.com", "pw"))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Unauthorized(ref m) if m == "Invalid email or password"));
}

// --- Authenticated Calls ---

#[tokio::test]
async fn test_current_user_sends_both_credentials() {
    let client = ApiClient::new(reqwest::Client::new(), &spawn_upstream().await);

    let user = client.current_user("good").await.unwrap();
    assert_eq!(user.name, "Mo");

    // 401 without a message body falls back to the session-expired notice.
    let err = client.current_user("bad").await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized(ref m) if m.contains("session has expired")));
}

#[tokio::test]
async fn test_fetch_json_error_mapping() {
    let client = ApiClient::new(reqwest::Client::new(), &spawn_upstream().await);

    let forbidden = client.fetch_json("/api/admin/stats", "good").await.unwrap_err();
    assert!(matches!(forbidden, ClientError::Forbidden(ref m) if m.contains("permission")));

    let rejected = client.fetch_json("/api/flaky", "good").await.unwrap_err();
    match rejected {
        ClientError::Rejected { status, message } => {
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(message, "Maintenance");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let html = client.fetch_json("/api/html", "good").await.unwrap_err();
    assert!(matches!(html, ClientError::Malformed(_)));
}
