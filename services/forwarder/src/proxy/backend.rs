//! The fixed backend endpoint.
//!
//! Every accepted connection is relayed to the same backend. There is no
//! pool, no health tracking and no retry: one connect attempt per client,
//! bounded by the connect timeout.

use std::future::Future;
use std::io;
use std::net::{SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::config::{ProxyConfig, DEFAULT_CONNECT_TIMEOUT};

/// The backend every relay connects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backend {
    /// Backend IPv4 socket address.
    addr: SocketAddrV4,
    /// Bound on a single connect attempt.
    connect_timeout: Duration,
}

impl Backend {
    /// Create a backend with the default connect timeout.
    pub fn new(addr: SocketAddrV4) -> Self {
        Self {
            addr,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Create a backend with a custom connect timeout.
    pub fn with_timeout(addr: SocketAddrV4, connect_timeout: Duration) -> Self {
        Self {
            addr,
            connect_timeout,
        }
    }

    /// Build the backend described by the loaded configuration.
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::with_timeout(config.backend_addr, config.connect_timeout)
    }

    /// Get the socket address for this backend.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(self.addr)
    }

    /// Get the bound applied to each connect attempt.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Open a new outbound connection. Exactly one attempt is made.
    pub async fn connect(&self) -> io::Result<TcpStream> {
        let addr = self.socket_addr();
        debug!(backend_addr = %addr, "Connecting to backend");

        bounded(self.connect_timeout, TcpStream::connect(addr)).await
    }
}

/// Run `fut` for at most `limit`; running out of time is `ErrorKind::TimedOut`.
async fn bounded<T>(
    limit: Duration,
    fut: impl Future<Output = io::Result<T>>,
) -> io::Result<T> {
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connect timeout")),
    }
}
