//! Endpoint address derivation
//!
//! The listener always targets the `/ws` path on the host it is given, using
//! the plain `ws://` scheme.

use std::fmt;

use thiserror::Error;

/// Scheme prefix for the target address
pub const WS_SCHEME: &str = "ws://";

/// Path of the WebSocket endpoint on the target host
pub const WS_PATH: &str = "/ws";

/// Errors that can occur while deriving an endpoint
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EndpointError {
    #[error("Invalid host {0:?}: expected hostname with optional port")]
    InvalidHost(String),
}

/// WebSocket endpoint derived from a host (hostname plus optional port)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    url: String,
}

impl Endpoint {
    /// Derive the endpoint `ws://<host>/ws` for the given host
    pub fn from_host(host: impl Into<String>) -> Result<Self, EndpointError> {
        let host = host.into();

        let malformed = host.is_empty()
            || host
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#'));
        if malformed {
            return Err(EndpointError::InvalidHost(host));
        }

        let url = format!("{WS_SCHEME}{host}{WS_PATH}");
        Ok(Self { host, url })
    }

    /// The host component this endpoint was derived from
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Full target address
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}
