//! The client-side half of the relay protocol.
//!
//! [`RelayMiddleware`] sits in the crawler's request/response path. On the
//! way out it decides whether a request should travel through the relay,
//! rewrites its URL into the relay addressing scheme and stamps provenance;
//! on the way back it restores the response's recorded URL so downstream
//! consumers never see the relay address. It is also the single owner of
//! the relay server handle.

use hyper::Uri;
use tracing::debug;

use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::proxy::ProxyServer;
use crate::request::{CrawlResponse, OutgoingRequest, RelayRequest};

/// Path prefix of the relay's forwarding route.
const FORWARD_ROUTE: &str = "request";

pub struct RelayMiddleware {
    server_url: String,
    server: Option<ProxyServer>,
}

impl RelayMiddleware {
    /// A rewriter without an owned server, for callers that run the relay
    /// server elsewhere.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            server: None,
        }
    }

    /// Build the middleware from host settings and start the owned relay
    /// server, seeded with the configured header rules.
    ///
    /// Both `server_url` and the header-rule mapping are required settings.
    /// Must be called from within a tokio runtime.
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let server_url = config
            .server_url
            .clone()
            .ok_or(Error::MissingSetting("server_url"))?;
        if config.headers.is_none() {
            return Err(Error::MissingSetting("headers"));
        }

        let mut server = ProxyServer::new(config.listen_addr()?);
        server.extract_header_rules(config.header_rules()?);
        server.start();

        Ok(Self {
            server_url,
            server: Some(server),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn server(&self) -> Option<&ProxyServer> {
        self.server.as_ref()
    }

    /// Stop and discard the owned server. Errors when there is none.
    pub async fn force_stop_server(&mut self) -> Result<()> {
        let mut server = self.server.take().ok_or(Error::ServerNotAlive)?;
        server.stop().await
    }

    /// Intercept an outgoing request.
    ///
    /// A request already carrying provenance passes through unchanged (the
    /// double-rewrite guard). A plain request flagged for proxying is
    /// converted and rewritten; an un-rewritten relay request is rewritten;
    /// anything else is left alone.
    pub fn process_request(&self, request: OutgoingRequest) -> Result<OutgoingRequest> {
        match request {
            OutgoingRequest::Relay(relay) if relay.is_rewritten() => {
                Ok(OutgoingRequest::Relay(relay))
            }
            OutgoingRequest::Crawl(crawl) if crawl.meta.proxy == Some(true) => {
                let mut relay = RelayRequest::new(crawl)?;
                self.rewrite(&mut relay);
                Ok(OutgoingRequest::Relay(relay))
            }
            OutgoingRequest::Relay(mut relay) => {
                self.rewrite(&mut relay);
                Ok(OutgoingRequest::Relay(relay))
            }
            other => Ok(other),
        }
    }

    /// Intercept an incoming response, restoring the logical URL stamped on
    /// its request. Responses to non-relay requests pass through unchanged.
    pub fn process_response(
        &self,
        request: &OutgoingRequest,
        mut response: CrawlResponse,
    ) -> CrawlResponse {
        if let OutgoingRequest::Relay(relay) = request {
            if let Some(original_url) = relay.original_url() {
                response.set_url(original_url);
            }
        }
        response
    }

    fn rewrite(&self, request: &mut RelayRequest) {
        let target_url = join_route(&self.server_url, FORWARD_ROUTE);
        let rewritten_url = format!("{}/{}", target_url, request.url().trim_start_matches('/'));
        debug!("Rewriting {} -> {}", request.url(), rewritten_url);
        request.apply_rewrite(rewritten_url, target_url);
    }
}

/// Join the relay base URL with a route path, normalizing slashes: the
/// result is `scheme://authority/route` with no trailing slash, however the
/// base's path or the route's slashes were given.
fn join_route(base_url: &str, route: &str) -> String {
    let route = route.trim_matches('/');
    match base_url.parse::<Uri>() {
        Ok(uri) => match (uri.scheme_str(), uri.authority()) {
            (Some(scheme), Some(authority)) => {
                format!("{scheme}://{authority}/{route}")
            }
            _ => format!("{}/{}", base_url.trim_end_matches('/'), route),
        },
        Err(_) => format!("{}/{}", base_url.trim_end_matches('/'), route),
    }
}
