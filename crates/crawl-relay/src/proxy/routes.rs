//! Route table and route guard.
//!
//! The relay serves exactly one route: `GET /request/{url}` where `{url}` is
//! a literal, fully-qualified http(s) URL embedded as the remainder of the
//! path. Everything else resolves to the fallback route, which the guard
//! rejects before any forwarding happens.

use std::collections::HashSet;

use hyper::Method;

/// Identity of a request handler bound on the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteId {
    /// `GET /request/{url}`: forward to the embedded URL.
    Forward,
    /// Any path or verb the route table does not know.
    Fallback,
}

/// The routes registered on the server. Built once before start and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteId>,
}

impl RouteTable {
    pub fn with_registered_routes() -> Self {
        Self {
            routes: vec![RouteId::Forward],
        }
    }

    pub fn routes(&self) -> &[RouteId] {
        &self.routes
    }

    #[cfg(test)]
    pub(crate) fn empty() -> Self {
        Self { routes: vec![] }
    }
}

/// Snapshot of the handler identities the server will actually serve.
///
/// Taken from the route table at server start; a resolved handler outside
/// this set is rejected with 404 even if the underlying matcher produced it
/// as a default/catch-all.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    allowed: HashSet<RouteId>,
}

impl RouteGuard {
    pub fn snapshot(table: &RouteTable) -> Self {
        Self {
            allowed: table.routes().iter().copied().collect(),
        }
    }

    pub fn accept(&self, route: RouteId) -> bool {
        self.allowed.contains(&route)
    }
}

/// Body of the 404 returned for requests the guard rejects.
pub const GUARD_REJECTION_BODY: &str = "Handler not found in the list of allowed handlers";

const FORWARD_PREFIX: &str = "/request/";

/// Resolve an inbound request to a route. For the forward route this also
/// extracts the embedded target URL.
///
/// The target is taken from the full path-and-query remainder, so a target
/// URL carrying its own query string survives intact.
pub fn resolve_route(method: &Method, path_and_query: &str) -> (RouteId, Option<String>) {
    if method != Method::GET {
        return (RouteId::Fallback, None);
    }
    match path_and_query.strip_prefix(FORWARD_PREFIX) {
        Some(rest) if rest.starts_with("http://") || rest.starts_with("https://") => {
            (RouteId::Forward, Some(rest.to_string()))
        }
        _ => (RouteId::Fallback, None),
    }
}
