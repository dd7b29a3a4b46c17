//! Error types for the relay library.

use thiserror::Error;

/// Errors surfaced by the relay middleware, server, and configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// The server was asked to stop while it was not running.
    #[error("server is not running; cannot stop it")]
    ServerNotAlive,

    /// A required host setting was not provided.
    #[error("setting '{0}' not found")]
    MissingSetting(&'static str),

    /// Neither a server URL nor a complete host/port pair was supplied.
    #[error("either 'server_url' or both 'host' and 'port' must be specified")]
    ListenAddrUnspecified,

    /// The configured server URL could not be parsed.
    #[error("invalid server URL '{url}': {reason}")]
    InvalidServerUrl { url: String, reason: String },

    /// A relay request was constructed with the proxy flag explicitly disabled.
    #[error("a relay request must not have its proxy flag set to false")]
    ProxyFlagDisabled,

    /// A configured header rule held a value that is neither a string,
    /// a derivation function, nor null.
    #[error("invalid value of type '{kind}' for header rule '{name}'")]
    HeaderRuleType { name: String, kind: String },

    /// A header rule named a header that is not a valid HTTP header name.
    #[error("invalid header name in rule '{0}'")]
    InvalidHeaderName(String),

    /// A resolved header value was not a valid HTTP header value.
    #[error("invalid header value for '{0}'")]
    InvalidHeaderValue(String),

    #[error("config file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
