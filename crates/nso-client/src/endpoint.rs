//! Server endpoint validation.
//!
//! An [`Endpoint`] is only constructed from a supported protocol, a port in
//! `1..=65535` and a host that resolves to an IPv4 address. All checks happen
//! before any request is sent.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use nso_core::{AddressResolver, NsoError, Result};

/// Path of the JSON-RPC endpoint on the server.
pub const JSONRPC_PATH: &str = "/jsonrpc";

/// URL scheme used to reach the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
    /// Plain HTTP.
    Http,
    /// HTTP over TLS.
    Https,
}

impl Protocol {
    /// Scheme string as it appears in the URL.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl FromStr for Protocol {
    type Err = NsoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(NsoError::validation(format!(
                "protocol must be http or https, got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated server address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    protocol: Protocol,
    host: Ipv4Addr,
    port: u16,
}

impl Endpoint {
    /// Validate `protocol` and `port`, then resolve `host` through `resolver`.
    ///
    /// `port` is taken as `u32` so out-of-range input such as `65536` is
    /// reported as a validation error rather than truncated.
    pub fn new(
        protocol: &str,
        host: &str,
        port: u32,
        resolver: &dyn AddressResolver,
    ) -> Result<Self> {
        let protocol = protocol.parse::<Protocol>()?;
        let port = u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| {
                NsoError::validation(format!("port must be between 1 and 65535, got {port}"))
            })?;
        let host = resolver.resolve_ipv4(host)?;
        Ok(Self {
            protocol,
            host,
            port,
        })
    }

    /// URL of the JSON-RPC endpoint.
    pub fn url(&self) -> String {
        format!("{}://{}:{}{JSONRPC_PATH}", self.protocol, self.host, self.port)
    }

    /// Scheme.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Resolved host address.
    pub fn host(&self) -> Ipv4Addr {
        self.host
    }

    /// TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}
