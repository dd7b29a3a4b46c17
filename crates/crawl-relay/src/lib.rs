//! crawl-relay: a sidecar forwarding proxy for web crawlers.
//!
//! The relay lets a crawler route selected outgoing HTTP requests through a
//! sidecar HTTP server so the relay's client stack performs the fetch while
//! the crawler's own lifecycle stays untouched. It has two halves:
//!
//! - [`proxy::ProxyServer`] is a minimal forwarding server whose single
//!   route, `GET /request/{url}`, decodes a fully-qualified target URL from
//!   its path, fetches it with policy-computed headers, and relays the
//!   response back.
//! - [`middleware::RelayMiddleware`] is the rewrite/unwrap protocol: flagged
//!   requests get their URL rewritten into the relay addressing scheme with
//!   provenance stamped on them, and their responses get the original URL
//!   restored before the crawler sees them.

pub mod config;
pub mod error;
pub mod middleware;
pub mod proxy;
pub mod request;

pub use config::{ListenAddr, RelayConfig};
pub use error::{Error, Result};
pub use middleware::RelayMiddleware;
pub use proxy::{ForwardedRequest, HeaderPolicy, HeaderRule, ProxyServer};
pub use request::{CrawlRequest, CrawlResponse, Meta, OutgoingRequest, Provenance, RelayRequest};
