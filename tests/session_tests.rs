use axum::http::{HeaderMap, HeaderValue, header};
use marketplace_portal::{
    models::SessionUser,
    session::{SessionCookies, SessionError, SessionKeys, cleared_cookies},
};
use std::time::Duration;

const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

fn provider() -> SessionUser {
    SessionUser {
        id: "65f0c1a2".to_string(),
        name: "Ada Provider".to_string(),
        email: "ada@example.com".to_string(),
        role: "provider".to_string(),
        is_approved: Some(true),
    }
}

fn cookie_names(values: &[HeaderValue]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.to_str().unwrap().split('=').next().unwrap().to_string())
        .collect()
}

// --- Cookie Parsing ---

#[test]
fn test_cookie_header_parsing() {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::COOKIE,
        HeaderValue::from_static("theme=dark; token=abc123; user=%7B%22role%22%3A%22admin%22%7D"),
    );
    headers.append(header::COOKIE, HeaderValue::from_static("session=signed.jwt.value"));

    let cookies = SessionCookies::from_headers(&headers);

    assert_eq!(cookies.token.as_deref(), Some("abc123"));
    assert_eq!(cookies.user.as_deref(), Some("%7B%22role%22%3A%22admin%22%7D"));
    assert_eq!(cookies.session.as_deref(), Some("signed.jwt.value"));
}

#[test]
fn test_access_token_alias_and_empty_values() {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::COOKIE,
        HeaderValue::from_static("token=; access_token=xyz; user="),
    );

    let cookies = SessionCookies::from_headers(&headers);

    assert_eq!(cookies.token.as_deref(), Some("xyz"));
    assert_eq!(cookies.user, None);
    assert_eq!(cookies.session, None);
}

#[test]
fn test_no_cookie_header() {
    assert_eq!(SessionCookies::from_headers(&HeaderMap::new()), SessionCookies::default());
}

// --- User Cookie ---

#[test]
fn test_user_cookie_decoding() {
    let raw = r#"{"_id":"1","name":"Cam","email":"cam@example.com","role":"customer"}"#;
    let user = SessionUser::from_cookie(raw).unwrap();
    assert_eq!(user.id, "1");
    assert_eq!(user.role, "customer");
    assert_eq!(user.is_approved, None);

    // Only the role is required.
    let minimal = SessionUser::from_cookie(r#"{"role":"admin"}"#).unwrap();
    assert_eq!(minimal.role, "admin");
    assert!(minimal.name.is_empty());

    let encoded = provider().to_cookie_value().unwrap();
    assert!(!encoded.contains('"'), "cookie value must be percent-encoded");
    assert_eq!(SessionUser::from_cookie(&encoded).unwrap(), provider());
}

#[test]
fn test_corrupt_user_cookie() {
    for raw in ["", "undefined", "{\"role\":", "{\"name\":\"no role\"}"] {
        assert!(matches!(
            SessionUser::from_cookie(raw),
            Err(SessionError::CorruptUserCookie)
        ));
    }
}

// --- Signed Session ---

#[test]
fn test_issue_and_verify() {
    let keys = SessionKeys::new("session-secret", WEEK, false);
    let token = keys.issue(&provider()).unwrap();

    let claims = keys.verify(&token).unwrap();
    assert_eq!(claims.sub, "65f0c1a2");
    assert_eq!(claims.role, "provider");
    assert_eq!(claims.approved, Some(true));
    assert_eq!(claims.exp - claims.iat, WEEK.as_secs() as usize);
    assert_eq!(claims.user(), provider());
}

#[test]
fn test_verify_rejects_tampering() {
    let keys = SessionKeys::new("session-secret", WEEK, false);
    let other = SessionKeys::new("other-secret", WEEK, false);
    let token = keys.issue(&provider()).unwrap();

    assert!(matches!(other.verify(&token), Err(SessionError::InvalidToken(_))));
    assert!(keys.verify("not.a.token").is_err());

    let mut tampered = token.clone();
    tampered.pop();
    tampered.push(if token.ends_with('A') { 'B' } else { 'A' });
    assert!(keys.verify(&tampered).is_err());
}

// --- Set-Cookie Values ---

#[test]
fn test_login_cookies() {
    let keys = SessionKeys::new("session-secret", WEEK, false);
    let cookies = keys.login_cookies("upstream-token", &provider()).unwrap();

    assert_eq!(cookie_names(&cookies), ["token", "user", "session"]);

    let rendered: Vec<&str> = cookies.iter().map(|v| v.to_str().unwrap()).collect();
    assert!(rendered[0].starts_with("token=upstream-token;"));
    assert!(rendered[0].contains("HttpOnly"));
    // The user record stays readable by the frontend.
    assert!(!rendered[1].contains("HttpOnly"));
    assert!(rendered[2].contains("HttpOnly"));
    for cookie in &rendered {
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=604800"));
        assert!(!cookie.contains("Secure"));
    }

    let session = rendered[2]
        .strip_prefix("session=")
        .and_then(|rest| rest.split(';').next())
        .unwrap();
    assert_eq!(keys.verify(session).unwrap().role, "provider");
}

#[test]
fn test_secure_flag_in_production() {
    let keys = SessionKeys::new("session-secret", WEEK, true);
    let cookies = keys.refresh_cookies(&provider()).unwrap();

    assert_eq!(cookie_names(&cookies), ["user", "session"]);
    assert!(cookies.iter().all(|v| v.to_str().unwrap().contains("; Secure")));
}

#[test]
fn test_cleared_cookies_expire_everything() {
    let cleared = cleared_cookies();

    assert_eq!(cookie_names(&cleared), ["token", "access_token", "user", "session"]);
    assert!(cleared.iter().all(|v| v.to_str().unwrap().contains("Max-Age=0")));
}
