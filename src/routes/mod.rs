/// Router Module Index
///
/// Routes are grouped by how they are protected. The grouping is what decides
/// which layers apply, so a route cannot silently miss its gate.

/// Reachable by anyone: health, login/logout.
pub mod public;

/// Protected by the `CurrentSession` extractor; rejects with `401` JSON.
pub mod authenticated;

/// Page navigations, all behind the route guard; rejects with redirects.
pub mod pages;

/// `/api/*` forwarding. The upstream backend does its own authorization.
pub mod api;
