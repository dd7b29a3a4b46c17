//! Request forwarding logic for the relay server.
//!
//! A forwarded request gets its outbound headers from the header policy,
//! then a single GET is issued against the target with a client session
//! scoped to that request. Every failure is mapped to an HTTP response so
//! the listener task never dies on an upstream problem.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{HeaderMap, Method, Response, StatusCode};
use tracing::{debug, warn};

use super::policy::{ForwardedRequest, HeaderPolicy};

/// Helper to build a plain-text error response.
pub fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("content-type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(message.to_string())))
        .unwrap()
}

/// Forward a relayed request to its target URL.
///
/// Success relays the upstream status and body, with the content type
/// reported as `text/html` regardless of what the upstream declared
/// (compatibility quirk, kept deliberately). An upstream failure that
/// carries a status is relayed with that status; any other transport
/// failure collapses to 500.
pub async fn forward(
    policy: &HeaderPolicy,
    target_url: &str,
    method: &Method,
    inbound_headers: &HeaderMap,
) -> Response<Full<Bytes>> {
    let inbound = ForwardedRequest {
        target_url,
        method,
        headers: inbound_headers,
    };

    let outbound_headers = match policy.resolve(&inbound) {
        Ok(headers) => headers,
        Err(e) => {
            warn!("Header resolution failed for {}: {}", target_url, e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("header resolution failed: {e}"),
            );
        }
    };

    debug!("Forwarding to: {}", target_url);

    // One client session per request, no pooling across requests. reqwest
    // picks up proxy settings from the environment by default.
    let client = match reqwest::Client::builder().build() {
        Ok(client) => client,
        Err(e) => {
            warn!("Failed to build upstream client: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("upstream client error: {e}"),
            );
        }
    };

    match client.get(target_url).headers(outbound_headers).send().await {
        Ok(upstream) => {
            let status = upstream.status();
            match upstream.bytes().await {
                Ok(body) => Response::builder()
                    .status(status)
                    .header("content-type", "text/html")
                    .body(Full::new(body))
                    .unwrap(),
                Err(e) => {
                    warn!("Failed to read upstream body from {}: {}", target_url, e);
                    error_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        &format!("upstream body error: {e}"),
                    )
                }
            }
        }
        Err(e) => {
            warn!("Upstream fetch failed for {}: {}", target_url, e);
            match e.status() {
                Some(status) => error_response(status, &format!("upstream response error: {e}")),
                None => error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &format!("upstream request error: {e}"),
                ),
            }
        }
    }
}
