use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

// --- Identity ---

/// Role
///
/// The three marketplace audiences. Each owns a URL namespace (`/admin`,
/// `/provider`, `/customer`) and a dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    Provider,
    Customer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Provider, Role::Customer];

    /// Parses a role claim. Unknown strings yield `None`, which callers treat as
    /// "matches no role".
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "admin" => Some(Role::Admin),
            "provider" => Some(Role::Provider),
            "customer" => Some(Role::Customer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Provider => "provider",
            Role::Customer => "customer",
        }
    }

    /// The namespace root, e.g. `/admin`.
    pub fn namespace(&self) -> &'static str {
        match self {
            Role::Admin => "/admin",
            Role::Provider => "/provider",
            Role::Customer => "/customer",
        }
    }

    /// Landing page after login.
    pub fn home_path(&self) -> String {
        format!("{}/dashboard", self.namespace())
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SessionUser
///
/// The serialized user record stored in the `user` cookie and embedded in the
/// signed session token. Only `role` is mandatory when decoding: older cookies
/// and hand-written test cookies carry nothing else.
///
/// `role` stays a raw string. An unrecognised role is a mismatch against every
/// namespace, not a corrupt session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SessionUser {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub role: String,
    #[serde(rename = "isApproved", default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub is_approved: Option<bool>,
}

impl SessionUser {
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }
}

// --- Request / Response Payloads ---

/// LoginRequest
///
/// Input payload for `POST /session/login`. The password is passed straight to
/// the upstream backend and never logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Where the browser wants to go after login. Only same-site absolute paths
    /// are honoured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub redirect: Option<String>,
}

/// LoginResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub success: bool,
    pub user: SessionUser,
    pub redirect: String,
}

/// LoginGrant
///
/// What the upstream backend hands back on a successful login: its own
/// credential plus the user record.
#[derive(Debug, Clone)]
pub struct LoginGrant {
    pub token: String,
    pub user: SessionUser,
}

// --- Dashboard ---

/// DashboardCount
///
/// A single tile on a role dashboard. `count` is `None` when its upstream
/// source failed; the rest of the dashboard still renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DashboardCount {
    pub key: String,
    pub label: String,
    pub count: Option<u64>,
}

/// DashboardSummary
///
/// Output schema for `GET /{role}/dashboard/summary`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DashboardSummary {
    pub role: Role,
    pub counts: Vec<DashboardCount>,
}

// --- Notifications ---

/// Notice
///
/// The failure body every gateway-owned endpoint returns. The frontend shows
/// `message` verbatim as a transient notification.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Notice {
    pub success: bool,
    pub message: String,
}

impl Notice {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
