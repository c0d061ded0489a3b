use std::{env, time::Duration};

/// Development-only signing secret. Production must provide `SESSION_SECRET`.
const LOCAL_SESSION_SECRET: &str = "super-secure-test-secret-value-local";

/// AppConfig
///
/// Holds the gateway's entire configuration state. Loaded once at startup and
/// immutable afterwards; pulled into handlers and extractors via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and error detail.
    pub env: Env,
    // Upstream REST host. The proxy forwards `/api/*` to `{api_base_url}/api/*`.
    pub api_base_url: String,
    // HMAC secret used to sign and verify the gateway `session` cookie.
    pub session_secret: String,
    // Which credential decides the role of a request.
    pub role_authority: RoleAuthority,
    // Hard bound on a single upstream call, body read included.
    pub proxy_timeout: Duration,
    // Lifetime of every session cookie and of the signed session token.
    pub session_ttl: Duration,
    // Listen address for the HTTP server.
    pub bind_addr: String,
    // Directory holding the built frontend bundle.
    pub static_dir: String,
}

/// Env
///
/// Defines the runtime context: pretty logs and verbose errors locally,
/// JSON logs and redacted errors in production.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// RoleAuthority
///
/// `SignedToken` trusts only the role claim inside the gateway-signed `session`
/// cookie. `UserCookie` trusts the client-readable `user` cookie, which is what
/// deployments without the gateway login flow still rely on.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RoleAuthority {
    SignedToken,
    UserCookie,
}

impl Default for AppConfig {
    /// Non-panicking configuration for tests and local scaffolding.
    fn default() -> Self {
        Self {
            env: Env::Local,
            api_base_url: "http://localhost:5000".to_string(),
            session_secret: LOCAL_SESSION_SECRET.to_string(),
            role_authority: RoleAuthority::SignedToken,
            proxy_timeout: Duration::from_secs(30),
            session_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            bind_addr: "0.0.0.0:3000".to_string(),
            static_dir: "public".to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from the environment and fails fast.
    ///
    /// # Panics
    /// Panics when a variable required in production (`API_BASE_URL`,
    /// `SESSION_SECRET`) is missing, or when any variable is malformed. The
    /// gateway must never start with an unsigned or misdirected session setup.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };
        let defaults = Self::default();

        let (api_base_url, session_secret) = match env {
            Env::Production => (
                env::var("API_BASE_URL").expect("FATAL: API_BASE_URL required in prod"),
                env::var("SESSION_SECRET").expect("FATAL: SESSION_SECRET must be set in production."),
            ),
            Env::Local => (
                env::var("API_BASE_URL").unwrap_or(defaults.api_base_url),
                env::var("SESSION_SECRET").unwrap_or(defaults.session_secret),
            ),
        };

        let role_authority = match env::var("ROLE_AUTHORITY").as_deref() {
            Err(_) | Ok("token") => RoleAuthority::SignedToken,
            Ok("cookie") => RoleAuthority::UserCookie,
            Ok(other) => panic!("FATAL: ROLE_AUTHORITY must be 'token' or 'cookie', got '{other}'"),
        };

        let proxy_timeout = Duration::from_secs(parse_or("PROXY_TIMEOUT_SECS", 30));
        let session_ttl = Duration::from_secs(parse_or("SESSION_TTL_DAYS", 7) * 24 * 60 * 60);

        Self {
            env,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            session_secret,
            role_authority,
            proxy_timeout,
            session_ttl,
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            static_dir: env::var("STATIC_DIR").unwrap_or(defaults.static_dir),
        }
    }

    pub fn is_production(&self) -> bool {
        self.env == Env::Production
    }
}

fn parse_or(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("FATAL: {key} must be a whole number: {e}")),
        Err(_) => default,
    }
}
