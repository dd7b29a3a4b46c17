//! Per-request handling for the relay listener.
//!
//! Resolves the route, consults the route guard, and hands accepted
//! requests to the forwarding logic. Every outcome is a response; nothing
//! here can take the listener down.

use std::convert::Infallible;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Request, Response, StatusCode};
use parking_lot::RwLock;

use super::forwarding::{error_response, forward};
use super::policy::HeaderPolicy;
use super::routes::{resolve_route, RouteGuard, RouteId, GUARD_REJECTION_BODY};

/// Shared state handed to the listener task at start.
pub(crate) struct ServerState {
    pub policy: Arc<RwLock<HeaderPolicy>>,
    pub guard: RouteGuard,
}

pub(crate) async fn handle_request<B>(
    state: &ServerState,
    req: Request<B>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let (route, target_url) = resolve_route(req.method(), path_and_query);

    if !state.guard.accept(route) {
        return Ok(error_response(StatusCode::NOT_FOUND, GUARD_REJECTION_BODY));
    }

    match (route, target_url) {
        (RouteId::Forward, Some(target_url)) => {
            // Snapshot the policy so rule updates apply from the next
            // request onward and no lock is held across the fetch.
            let policy = state.policy.read().clone();
            Ok(forward(&policy, &target_url, req.method(), req.headers()).await)
        }
        _ => Ok(error_response(StatusCode::NOT_FOUND, GUARD_REJECTION_BODY)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::routes::RouteTable;
    use hyper::Method;

    fn state() -> ServerState {
        ServerState {
            policy: Arc::new(RwLock::new(HeaderPolicy::with_defaults())),
            guard: RouteGuard::snapshot(&RouteTable::with_registered_routes()),
        }
    }

    fn request(method: Method, uri: &str) -> Request<()> {
        Request::builder().method(method).uri(uri).body(()).unwrap()
    }

    #[tokio::test]
    async fn test_unmatched_path_is_rejected_with_404() {
        let response = handle_request(&state(), request(Method::GET, "/error"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_non_get_is_rejected_with_404() {
        let response = handle_request(
            &state(),
            request(Method::POST, "/request/https://example.org/"),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_guard_rejects_registered_route() {
        // A guard snapshotted from an empty table rejects even the
        // forward route.
        let state = ServerState {
            policy: Arc::new(RwLock::new(HeaderPolicy::new())),
            guard: RouteGuard::snapshot(&RouteTable::empty()),
        };
        let response = handle_request(
            &state,
            request(Method::GET, "/request/https://example.org/"),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
