//! Configuration for the relay.
//!
//! The listen address comes either from a base `server_url` or from an
//! explicit `host` + `port` pair; exactly one of the two forms must be
//! supplied. Header rules are an ordered YAML mapping of header name to a
//! string (literal), null (pass-through), or anything else (a type error,
//! raised when the rule is resolved).

use std::path::Path;

use hyper::Uri;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::proxy::HeaderRule;

/// Host and port the relay listener binds to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenAddr {
    pub host: String,
    pub port: u16,
}

impl ListenAddr {
    /// Resolve the listen address from either a base URL or a host/port
    /// pair. The base URL takes precedence; a URL without an explicit port
    /// falls back to the scheme default.
    pub fn resolve(
        server_url: Option<&str>,
        host: Option<&str>,
        port: Option<u16>,
    ) -> Result<Self> {
        if let Some(url) = server_url {
            let uri: Uri = url.parse().map_err(|e: hyper::http::uri::InvalidUri| {
                Error::InvalidServerUrl {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            })?;
            let host = uri
                .host()
                .ok_or_else(|| Error::InvalidServerUrl {
                    url: url.to_string(),
                    reason: "missing host".to_string(),
                })?
                .to_string();
            let port = uri.port_u16().unwrap_or_else(|| {
                if uri.scheme_str() == Some("https") {
                    443
                } else {
                    80
                }
            });
            return Ok(Self { host, port });
        }
        match (host, port) {
            (Some(host), Some(port)) => Ok(Self {
                host: host.to_string(),
                port,
            }),
            _ => Err(Error::ListenAddrUnspecified),
        }
    }
}

/// Settings consumed from the host collaborator at startup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayConfig {
    /// Base URL the relay listens on, e.g. `http://localhost:8080/`.
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    /// Ordered header-rule mapping seeding the header policy.
    #[serde(default)]
    pub headers: Option<serde_yaml::Mapping>,
}

impl RelayConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: RelayConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Fail fast on an unusable listen address or malformed header names.
    /// Malformed header *values* are deliberately kept until resolution.
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        if let Some(headers) = &self.headers {
            for key in headers.keys() {
                if !key.is_string() {
                    return Err(Error::InvalidHeaderName(format!("{key:?}")));
                }
            }
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<ListenAddr> {
        ListenAddr::resolve(self.server_url.as_deref(), self.host.as_deref(), self.port)
    }

    /// The configured header rules, in declaration order.
    pub fn header_rules(&self) -> Result<Vec<(String, HeaderRule)>> {
        let Some(headers) = &self.headers else {
            return Ok(Vec::new());
        };
        let mut rules = Vec::with_capacity(headers.len());
        for (key, value) in headers {
            let name = key
                .as_str()
                .ok_or_else(|| Error::InvalidHeaderName(format!("{key:?}")))?;
            rules.push((name.to_string(), HeaderRule::from_yaml(value)));
        }
        Ok(rules)
    }
}
