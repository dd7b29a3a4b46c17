//! Relay proxy server module.
//!
//! The server accepts `GET /request/{url}` where `{url}` is a literal,
//! fully-qualified http(s) URL, forwards a single GET to that target with
//! headers computed by the header policy, and relays the response back.
//!
//! # Module Structure
//!
//! - `server` - ProxyServer struct, lifecycle, and listener loop
//! - `handler` - per-request routing and guard checks
//! - `forwarding` - the outbound fetch and error mapping
//! - `policy` - the header allow-list
//! - `routes` - route table, route guard, and route resolution

mod forwarding;
mod handler;
mod policy;
mod routes;
mod server;

pub use forwarding::error_response;
pub use policy::{ForwardedRequest, HeaderFn, HeaderPolicy, HeaderRule};
pub use routes::{resolve_route, RouteGuard, RouteId, RouteTable, GUARD_REJECTION_BODY};
pub use server::ProxyServer;
