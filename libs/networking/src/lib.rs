//! Host networking helpers for the forwarder.
//!
//! This library provides:
//! - Local host name lookup
//! - Resolution of the host name to the IPv4 address shown in startup banners

use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};

use thiserror::Error;

/// Networking errors.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The kernel refused to report the host name.
    #[error("unable to read host name: {0}")]
    HostName(#[from] nix::Error),

    /// Host name bytes are not valid UTF-8.
    #[error("host name is not valid UTF-8: {0}")]
    NonUtf8HostName(String),

    /// Name resolution failed outright.
    #[error("unable to resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// Resolution succeeded but yielded no IPv4 address.
    #[error("no IPv4 address found for {0}")]
    NoIpv4Address(String),
}

// ============================================================================
// Local host information
// ============================================================================

/// Return the host name of this machine.
pub fn host_name() -> Result<String, NetworkError> {
    let name = nix::unistd::gethostname()?;
    name.into_string()
        .map_err(|raw| NetworkError::NonUtf8HostName(raw.to_string_lossy().into_owned()))
}

/// Resolve `host` and return the first IPv4 address it maps to.
pub fn resolve_ipv4(host: &str) -> Result<Ipv4Addr, NetworkError> {
    let addrs = (host, 0)
        .to_socket_addrs()
        .map_err(|source| NetworkError::Resolve {
            host: host.to_string(),
            source,
        })?;

    first_ipv4(addrs).ok_or_else(|| NetworkError::NoIpv4Address(host.to_string()))
}

/// Discover the IPv4 address this machine's host name resolves to.
///
/// Used for the listening banner only; the listener itself binds the
/// unspecified address.
pub fn local_ipv4() -> Result<Ipv4Addr, NetworkError> {
    let host = host_name()?;
    resolve_ipv4(&host)
}

/// Pick the first IPv4 address out of a resolver result.
fn first_ipv4(addrs: impl IntoIterator<Item = SocketAddr>) -> Option<Ipv4Addr> {
    addrs.into_iter().find_map(|addr| match addr {
        SocketAddr::V4(v4) => Some(*v4.ip()),
        SocketAddr::V6(_) => None,
    })
}
