//! Resolver.
//!
//! Maps a non-literal address to a literal IPv4 at prober startup. A
//! strict dotted-quad match is returned unchanged; anything else goes
//! through a name lookup on a blocking thread so the async prober loop
//! never stalls the runtime on DNS.

use std::net::Ipv4Addr;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("dns lookup failed for {0}")]
    Lookup(String),
    #[error("no A record for {0}")]
    NoAddress(String),
}

fn ipv4_literal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)$")
            .unwrap()
    })
}

/// Returns `true` if `address` already matches a strict IPv4 dotted-quad.
pub fn is_ipv4_literal(address: &str) -> bool {
    ipv4_literal_re().is_match(address)
}

/// Resolve `address` to a literal IPv4. Literal addresses are parsed and
/// returned immediately; anything else performs a name lookup and returns
/// the first IPv4 address found.
pub async fn resolve(address: &str) -> Result<Ipv4Addr, ResolveError> {
    if is_ipv4_literal(address) {
        return address
            .parse()
            .map_err(|_| ResolveError::Lookup(address.to_string()));
    }

    let host = format!("{}:0", address);
    let host_owned = address.to_string();

    tokio::task::spawn_blocking(move || {
        use std::net::ToSocketAddrs;
        host.to_socket_addrs()
            .map_err(|e| ResolveError::Lookup(format!("{}: {}", host_owned, e)))
    })
    .await
    .map_err(|e| ResolveError::Lookup(e.to_string()))?
    .and_then(|mut addrs| {
        addrs
            .find_map(|a| match a.ip() {
                std::net::IpAddr::V4(v4) => Some(v4),
                std::net::IpAddr::V6(_) => None,
            })
            .ok_or_else(|| ResolveError::NoAddress(address.to_string()))
    })
}
