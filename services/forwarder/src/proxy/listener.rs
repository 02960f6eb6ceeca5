//! TCP listener and connection handling.
//!
//! The listener accepts client connections one at a time and hands each one
//! to its own spawned task, which connects to the backend and relays until
//! either side closes. The accept loop never waits on a relay task and keeps
//! no handle to it.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn, Instrument};

use super::backend::Backend;
use super::relay::{relay, RelaySummary};
use crate::config::ProxyConfig;

/// Pause after a failed accept before trying again.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// The forwarder's TCP listener.
pub struct Listener {
    /// The TCP listener.
    listener: TcpListener,
    /// Backend every accepted connection is relayed to.
    backend: Backend,
}

impl Listener {
    /// Bind the frontend port described by `config`.
    pub async fn bind(config: &ProxyConfig) -> io::Result<Self> {
        Self::bind_addr(config.listen_addr(), Backend::from_config(config)).await
    }

    /// Bind an explicit address, relaying to `backend`.
    pub async fn bind_addr(bind_addr: SocketAddr, backend: Backend) -> io::Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        let local_addr = listener.local_addr()?;

        info!(
            bind_addr = %local_addr,
            backend_addr = %backend.socket_addr(),
            "Listener bound"
        );

        Ok(Self { listener, backend })
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the listener, accepting and handing off connections forever.
    pub async fn run(self) -> io::Result<()> {
        let local_addr = self.listener.local_addr()?;
        info!(bind_addr = %local_addr, "Listener started");

        loop {
            match self.listener.accept().await {
                Ok((stream, peer_addr)) => {
                    info!(peer_ip = %peer_addr.ip(), "Received connection");

                    let backend = self.backend;
                    tokio::spawn(
                        async move {
                            let _ = handle_connection(stream, peer_addr, backend).await;
                        }
                        .instrument(tracing::info_span!("connection", peer = %peer_addr)),
                    );
                }
                Err(e) => {
                    error!(error = %e, "Error accepting connection");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
    }
}

/// Serve one accepted client: connect to the backend, relay, close both.
///
/// A failed backend connect drops the client stream and returns the error.
/// Nothing here can affect the listener or any other connection.
pub async fn handle_connection(
    client: TcpStream,
    peer_addr: SocketAddr,
    backend: Backend,
) -> io::Result<RelaySummary> {
    let backend_stream = match backend.connect().await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(
                backend_addr = %backend.socket_addr(),
                error = %e,
                "Unable to connect to the backend server"
            );
            return Err(e);
        }
    };

    debug!(backend_addr = %backend.socket_addr(), "Connected to backend");

    let summary = relay(client, backend_stream).await;

    info!(
        peer_ip = %peer_addr.ip(),
        bytes_to_backend = summary.bytes_to_backend,
        bytes_to_client = summary.bytes_to_client,
        reason = %summary.end,
        "Connection closed"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::RelayEnd;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let config = ProxyConfig::from_json(
            r#"{"proxied_host": {"general_settings": {"backend_ip": "127.0.0.1", "backend_port": 9}}}"#,
        )
        .unwrap();
        let listener = Listener::bind(&config).await.unwrap();

        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert!(addr.ip().is_unspecified());
    }

    #[tokio::test]
    async fn test_handle_connection_backend_down() {
        let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_addr = match dead.local_addr().unwrap() {
            SocketAddr::V4(v4) => v4,
            SocketAddr::V6(_) => unreachable!(),
        };
        drop(dead);

        let front = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let front_addr = front.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(front_addr), front.accept());
        let mut client = client.unwrap();
        let (server_side, peer) = accepted.unwrap();

        let backend = Backend::with_timeout(dead_addr, Duration::from_millis(500));
        assert!(handle_connection(server_side, peer, backend).await.is_err());

        let mut buf = [0u8; 4];
        let n = client.read(&mut buf).await.unwrap_or(0);
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_handle_connection_relays() {
        let echo = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let echo_addr = match echo.local_addr().unwrap() {
            SocketAddr::V4(v4) => v4,
            SocketAddr::V6(_) => unreachable!(),
        };
        tokio::spawn(async move {
            let (mut stream, _) = echo.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let n = stream.read(&mut buf).await.unwrap();
            stream.write_all(&buf[..n]).await.unwrap();
        });

        let front = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let front_addr = front.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(front_addr), front.accept());
        let mut client = client.unwrap();
        let (server_side, peer) = accepted.unwrap();

        let task = tokio::spawn(handle_connection(server_side, peer, Backend::new(echo_addr)));

        client.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        let summary = task.await.unwrap().unwrap();
        assert_eq!(summary.end, RelayEnd::BackendClosed);
        assert_eq!(summary.bytes_to_backend, 5);
        assert_eq!(summary.bytes_to_client, 5);
    }
}
