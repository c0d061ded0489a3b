use serde_json::Value;

use crate::{
    client::{Backend, ClientError},
    models::{DashboardCount, DashboardSummary, Role},
};

/// An upstream list whose size is one dashboard tile.
#[derive(Debug, Clone, Copy)]
pub struct CountSource {
    pub key: &'static str,
    pub label: &'static str,
    pub path: &'static str,
}

const fn source(key: &'static str, label: &'static str, path: &'static str) -> CountSource {
    CountSource { key, label, path }
}

const ADMIN_SOURCES: &[CountSource] = &[
    source("users", "Users", "/api/users"),
    source("pendingProviders", "Providers awaiting approval", "/api/users?role=provider&isApproved=false"),
    source("services", "Services", "/api/services"),
    source("subscriptions", "Subscriptions", "/api/subscriptions"),
    source("reviews", "Reviews", "/api/reviews"),
];

const PROVIDER_SOURCES: &[CountSource] = &[
    source("services", "My services", "/api/services/mine"),
    source("priceLists", "Price lists", "/api/price-lists/mine"),
    source("subscriptions", "Subscriptions", "/api/subscriptions/provider"),
    source("reviews", "Reviews", "/api/reviews/provider"),
];

const CUSTOMER_SOURCES: &[CountSource] = &[
    source("subscriptions", "My subscriptions", "/api/subscriptions/mine"),
    source("reviews", "My reviews", "/api/reviews/mine"),
    source("jobPosts", "Job posts", "/api/job-posts/mine"),
];

pub fn sources(role: Role) -> &'static [CountSource] {
    match role {
        Role::Admin => ADMIN_SOURCES,
        Role::Provider => PROVIDER_SOURCES,
        Role::Customer => CUSTOMER_SOURCES,
    }
}

/// count_items
///
/// Size of an upstream listing. Accepts a bare array, an object reporting
/// `total` or `count`, or an object wrapping the array in `data`. Anything else
/// counts as empty.
pub fn count_items(body: &Value) -> u64 {
    if let Some(items) = body.as_array() {
        return items.len() as u64;
    }
    if let Some(total) = ["total", "count"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_u64))
    {
        return total;
    }
    body.get("data").map_or(0, count_items)
}

/// summarize
///
/// Fetches every source for `role` in turn. A source that fails on its own
/// becomes a `null` tile. An auth failure from upstream aborts the whole
/// summary.
pub async fn summarize(
    backend: &dyn Backend,
    role: Role,
    token: &str,
) -> Result<DashboardSummary, ClientError> {
    let mut counts = Vec::new();

    for source in sources(role) {
        let count = match backend.fetch_json(source.path, token).await {
            Ok(body) => Some(count_items(&body)),
            Err(e @ (ClientError::Unauthorized(_) | ClientError::Forbidden(_))) => return Err(e),
            Err(e) => {
                tracing::warn!(source = source.key, error = %e, "dashboard source failed");
                None
            }
        };
        counts.push(DashboardCount {
            key: source.key.to_string(),
            label: source.label.to_string(),
            count,
        });
    }

    Ok(DashboardSummary { role, counts })
}
