/// Validated transport endpoint.

use crate::error::{ClientError, Result};
use std::fmt;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint(Url);

impl Endpoint {
    /// Parse a URI, converting http(s) schemes to their WebSocket equivalents.
    pub fn parse(input: &str) -> Result<Self> {
        let mut url = Url::parse(input)
            .map_err(|e| ClientError::InvalidEndpoint(format!("{}: {}", input, e)))?;

        let scheme = match url.scheme() {
            "ws" | "http" => "ws",
            "wss" | "https" => "wss",
            other => {
                return Err(ClientError::InvalidEndpoint(format!(
                    "unsupported scheme '{}' in {}",
                    other, input
                )))
            }
        };
        if url.host_str().is_none() {
            return Err(ClientError::InvalidEndpoint(format!("missing host in {}", input)));
        }
        if url.scheme() != scheme {
            url.set_scheme(scheme).map_err(|_| {
                ClientError::InvalidEndpoint(format!("cannot convert scheme of {}", input))
            })?;
        }

        Ok(Endpoint(url))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl std::str::FromStr for Endpoint {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        Endpoint::parse(s)
    }
}
