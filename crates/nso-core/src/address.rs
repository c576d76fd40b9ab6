//! IPv4 address validation and host resolution.
//!
//! The client always talks to an IPv4 literal. Hosts are turned into one by
//! an [`AddressResolver`]; [`SystemResolver`] accepts global-unicast IPv4
//! literals directly and falls back to the system resolver for everything
//! else, keeping the first IPv4 result.

use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

use crate::errors::{NsoError, Result};

/// Parse `address` as an IPv4 address.
pub fn ipv4_address(address: &str) -> Result<Ipv4Addr> {
    address
        .parse::<Ipv4Addr>()
        .map_err(|_| NsoError::validation(format!("not a valid IPv4 address: {address}")))
}

/// Parse `address` as a global unicast IPv4 address.
///
/// Private ranges count as global unicast; loopback, link-local, multicast,
/// broadcast and the unspecified address do not.
pub fn ipv4_unicast_address(address: &str) -> Result<Ipv4Addr> {
    let ip = ipv4_address(address)?;
    if is_global_unicast(ip) {
        Ok(ip)
    } else {
        Err(NsoError::validation(format!(
            "not a valid IPv4 unicast address: {address}"
        )))
    }
}

/// Parse `address` as an IPv4 multicast address.
pub fn ipv4_multicast_address(address: &str) -> Result<Ipv4Addr> {
    let ip = ipv4_address(address)?;
    if ip.is_multicast() {
        Ok(ip)
    } else {
        Err(NsoError::validation(format!(
            "not a valid IPv4 multicast address: {address}"
        )))
    }
}

fn is_global_unicast(ip: Ipv4Addr) -> bool {
    !(ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_loopback()
        || ip.is_multicast()
        || ip.is_link_local())
}

/// Turns a host name or literal into the IPv4 address the client connects to.
pub trait AddressResolver: Send + Sync {
    /// Resolve `host` to a single IPv4 address.
    fn resolve_ipv4(&self, host: &str) -> Result<Ipv4Addr>;
}

/// Resolver backed by the operating system's name lookup.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemResolver;

impl AddressResolver for SystemResolver {
    fn resolve_ipv4(&self, host: &str) -> Result<Ipv4Addr> {
        if let Ok(ip) = ipv4_unicast_address(host) {
            return Ok(ip);
        }

        let addrs = (host, 0).to_socket_addrs().map_err(|e| {
            NsoError::validation(format!("could not resolve host {host}: {e}"))
        })?;

        addrs
            .map(|a| a.ip())
            .find_map(|ip| match ip {
                IpAddr::V4(v4) => Some(v4),
                IpAddr::V6(_) => None,
            })
            .inspect(|ip| tracing::debug!(host, resolved = %ip, "resolved host"))
            .ok_or_else(|| NsoError::validation(format!("no IPv4 address found for host {host}")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
