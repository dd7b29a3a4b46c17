//! Request and response types exchanged with the host crawler.
//!
//! The crawler hands the middleware plain [`CrawlRequest`]s. Requests that
//! should travel through the relay become [`RelayRequest`]s, which carry
//! provenance (the original and target URLs) once rewritten. Keeping "raw"
//! and "rewritten" as distinct states makes the double-rewrite guard a type
//! check instead of a metadata probe.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use hyper::{HeaderMap, Method, StatusCode};

use crate::error::{Error, Result};

/// Request metadata carried alongside a crawl request.
///
/// `proxy` is the tri-state relay flag: `Some(true)` requests proxying,
/// `None` leaves the relay out of the picture. `Some(false)` is only legal
/// on a plain request; constructing a [`RelayRequest`] from it fails.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Meta {
    pub proxy: Option<bool>,
    pub extra: HashMap<String, String>,
}

/// A plain outgoing request from the host crawler.
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub meta: Meta,
}

impl CrawlRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            meta: Meta::default(),
        }
    }

    /// Mark this request for proxying through the relay.
    pub fn with_proxy_flag(mut self) -> Self {
        self.meta.proxy = Some(true);
        self
    }
}

/// Provenance stamped on a rewritten request: the URL the caller actually
/// wants fetched and the relay route prefix it was redirected through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub original_url: String,
    pub target_url: String,
}

/// A request destined for the relay.
///
/// Starts out un-rewritten (no provenance); the middleware rewrites its URL
/// into the relay addressing scheme and stamps provenance exactly once.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    request: CrawlRequest,
    provenance: Option<Provenance>,
}

impl RelayRequest {
    /// Wrap a crawl request for relaying, copying method, headers, body and
    /// metadata. Fails fast if the proxy flag was explicitly disabled.
    pub fn new(request: CrawlRequest) -> Result<Self> {
        if request.meta.proxy == Some(false) {
            return Err(Error::ProxyFlagDisabled);
        }
        Ok(Self {
            request,
            provenance: None,
        })
    }

    pub fn url(&self) -> &str {
        &self.request.url
    }

    pub fn method(&self) -> &Method {
        &self.request.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.request.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.request.body
    }

    pub fn meta(&self) -> &Meta {
        &self.request.meta
    }

    /// The URL the caller actually wants fetched, once rewritten.
    pub fn original_url(&self) -> Option<&str> {
        self.provenance.as_ref().map(|p| p.original_url.as_str())
    }

    /// The relay route prefix this request was redirected through.
    pub fn target_url(&self) -> Option<&str> {
        self.provenance.as_ref().map(|p| p.target_url.as_str())
    }

    pub fn is_rewritten(&self) -> bool {
        self.provenance.is_some()
    }

    /// Replace the request URL with its rewritten form and stamp provenance.
    /// A request that already carries provenance is left untouched.
    pub(crate) fn apply_rewrite(&mut self, rewritten_url: String, target_url: String) {
        if self.provenance.is_some() {
            return;
        }
        let original_url = std::mem::replace(&mut self.request.url, rewritten_url);
        self.provenance = Some(Provenance {
            original_url,
            target_url,
        });
    }
}

impl fmt::Display for RelayRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.provenance {
            Some(p) => write!(
                f,
                "<{} {} via {}>",
                self.request.method, p.original_url, p.target_url
            ),
            None => write!(f, "<{} {}>", self.request.method, self.request.url),
        }
    }
}

/// An outgoing request as seen by the middleware: either a plain crawl
/// request or one already destined for the relay.
#[derive(Debug, Clone)]
pub enum OutgoingRequest {
    Crawl(CrawlRequest),
    Relay(RelayRequest),
}

impl From<CrawlRequest> for OutgoingRequest {
    fn from(request: CrawlRequest) -> Self {
        OutgoingRequest::Crawl(request)
    }
}

impl From<RelayRequest> for OutgoingRequest {
    fn from(request: RelayRequest) -> Self {
        OutgoingRequest::Relay(request)
    }
}

impl OutgoingRequest {
    /// The URL this request would currently be dispatched to.
    pub fn url(&self) -> &str {
        match self {
            OutgoingRequest::Crawl(r) => &r.url,
            OutgoingRequest::Relay(r) => r.url(),
        }
    }
}

/// A response as handed back to the host crawler.
#[derive(Debug, Clone)]
pub struct CrawlResponse {
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CrawlResponse {
    pub fn new(url: impl Into<String>, status: StatusCode) -> Self {
        Self {
            url: url.into(),
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Overwrite the recorded URL (the unwrap step of the relay protocol).
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_request_accepts_unset_and_true_flag() {
        let url = "https://www.python.org/";
        assert!(RelayRequest::new(CrawlRequest::new(url)).is_ok());
        assert!(RelayRequest::new(CrawlRequest::new(url).with_proxy_flag()).is_ok());
    }

    #[test]
    fn test_relay_request_rejects_disabled_flag() {
        let mut request = CrawlRequest::new("https://www.python.org/");
        request.meta.proxy = Some(false);
        assert!(matches!(
            RelayRequest::new(request),
            Err(Error::ProxyFlagDisabled)
        ));
    }

    #[test]
    fn test_conversion_preserves_fields() {
        let mut request = CrawlRequest::new("https://www.python.org/");
        request.method = Method::GET;
        request.headers.insert("x-test", "1".parse().unwrap());
        request.body = Bytes::from_static(b"payload");
        request.meta.extra.insert("depth".to_string(), "2".to_string());

        let relay = RelayRequest::new(request.clone()).unwrap();
        assert_eq!(relay.url(), request.url);
        assert_eq!(relay.headers().get("x-test").unwrap(), "1");
        assert_eq!(relay.body(), &request.body);
        assert_eq!(relay.meta().extra.get("depth").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_provenance_is_stamped_once() {
        let mut relay = RelayRequest::new(CrawlRequest::new("https://python.org")).unwrap();
        assert!(relay.original_url().is_none());
        assert!(relay.target_url().is_none());

        relay.apply_rewrite(
            "http://localhost:8080/request/https://python.org".to_string(),
            "http://localhost:8080/request".to_string(),
        );
        assert_eq!(relay.original_url(), Some("https://python.org"));
        assert_eq!(relay.target_url(), Some("http://localhost:8080/request"));

        // Second rewrite must not overwrite the stamped original URL.
        relay.apply_rewrite("http://elsewhere/".to_string(), "http://elsewhere".to_string());
        assert_eq!(relay.original_url(), Some("https://python.org"));
        assert_eq!(
            relay.url(),
            "http://localhost:8080/request/https://python.org"
        );
    }

    #[test]
    fn test_display_before_and_after_rewrite() {
        let url = "http://localhost:8080/handler/https://python.org";
        let relay = RelayRequest::new(CrawlRequest::new(url)).unwrap();
        assert_eq!(relay.to_string(), format!("<GET {url}>"));

        let mut rewritten = RelayRequest::new(CrawlRequest::new("https://python.org")).unwrap();
        rewritten.apply_rewrite(
            "http://localhost:8080/handler/https://python.org".to_string(),
            "http://localhost:8080/handler".to_string(),
        );
        assert_eq!(
            rewritten.to_string(),
            "<GET https://python.org via http://localhost:8080/handler>"
        );
    }

    #[test]
    fn test_response_set_url() {
        let mut response = CrawlResponse::new(
            "http://localhost:8080/request/https://python.org",
            StatusCode::OK,
        );
        response.set_url("https://python.org");
        assert_eq!(response.url, "https://python.org");
    }
}
