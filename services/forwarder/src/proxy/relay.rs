//! Bidirectional byte relay between one client and its backend connection.
//!
//! A single loop waits for readability on both streams at once. Whatever is
//! read from one side is written in full to the other before the loop waits
//! again, so byte order within each direction is preserved. The first EOF,
//! read error or write error on either side ends the relay for both
//! directions; half-closed streams are not drained.

use std::fmt;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Upper bound on a single read from either stream.
pub const RELAY_BUFFER_SIZE: usize = 4096;

/// Why a relay stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    /// Client sent EOF.
    ClientClosed,
    /// Backend sent EOF.
    BackendClosed,
    /// Reading from or writing to the client failed.
    ClientError(io::ErrorKind),
    /// Reading from or writing to the backend failed.
    BackendError(io::ErrorKind),
}

impl fmt::Display for RelayEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayEnd::ClientClosed => write!(f, "client closed"),
            RelayEnd::BackendClosed => write!(f, "backend closed"),
            RelayEnd::ClientError(kind) => write!(f, "client error: {}", kind),
            RelayEnd::BackendError(kind) => write!(f, "backend error: {}", kind),
        }
    }
}

/// Outcome of one relay instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySummary {
    /// Bytes written to the backend.
    pub bytes_to_backend: u64,
    /// Bytes written to the client.
    pub bytes_to_client: u64,
    /// What ended the relay.
    pub end: RelayEnd,
}

/// Relay bytes between `client` and `backend` until either side closes or
/// fails, then close both.
///
/// Both streams are owned here and dropped together on return.
pub async fn relay(mut client: TcpStream, mut backend: TcpStream) -> RelaySummary {
    let (mut client_read, mut client_write) = client.split();
    let (mut backend_read, mut backend_write) = backend.split();

    let mut client_buf = vec![0u8; RELAY_BUFFER_SIZE];
    let mut backend_buf = vec![0u8; RELAY_BUFFER_SIZE];
    let mut bytes_to_backend = 0u64;
    let mut bytes_to_client = 0u64;

    // Both reads are cancel safe: the branch that loses the race has
    // consumed nothing and is simply polled again on the next pass.
    let end = loop {
        tokio::select! {
            read = client_read.read(&mut client_buf) => match read {
                Ok(0) => break RelayEnd::ClientClosed,
                Ok(n) => {
                    if let Err(e) = backend_write.write_all(&client_buf[..n]).await {
                        break RelayEnd::BackendError(e.kind());
                    }
                    bytes_to_backend += n as u64;
                }
                Err(e) => break RelayEnd::ClientError(e.kind()),
            },
            read = backend_read.read(&mut backend_buf) => match read {
                Ok(0) => break RelayEnd::BackendClosed,
                Ok(n) => {
                    if let Err(e) = client_write.write_all(&backend_buf[..n]).await {
                        break RelayEnd::ClientError(e.kind());
                    }
                    bytes_to_client += n as u64;
                }
                Err(e) => break RelayEnd::BackendError(e.kind()),
            },
        }
    };

    RelaySummary {
        bytes_to_backend,
        bytes_to_client,
        end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    /// Connected (local, remote) TCP pair over loopback.
    async fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (local, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (local.unwrap(), accepted.unwrap().0)
    }

    #[tokio::test]
    async fn test_relay_forwards_both_directions() {
        let (mut client, client_side) = tcp_pair().await;
        let (backend_side, mut backend) = tcp_pair().await;

        let task = tokio::spawn(relay(client_side, backend_side));

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        backend.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        backend.write_all(b"pong").await.unwrap();
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");

        drop(client);
        let summary = timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert_eq!(summary.end, RelayEnd::ClientClosed);
        assert_eq!(summary.bytes_to_backend, 4);
        assert_eq!(summary.bytes_to_client, 4);
    }

    #[tokio::test]
    async fn test_backend_close_closes_client() {
        let (mut client, client_side) = tcp_pair().await;
        let (backend_side, backend) = tcp_pair().await;

        let task = tokio::spawn(relay(client_side, backend_side));
        drop(backend);

        let summary = timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert_eq!(summary.end, RelayEnd::BackendClosed);

        let mut buf = [0u8; 8];
        let n = timeout(Duration::from_secs(2), client.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_client_half_close_ends_relay() {
        let (mut client, client_side) = tcp_pair().await;
        let (backend_side, mut backend) = tcp_pair().await;

        let task = tokio::spawn(relay(client_side, backend_side));

        client.write_all(b"last words").await.unwrap();
        client.shutdown().await.unwrap();

        let mut received = Vec::new();
        timeout(Duration::from_secs(2), backend.read_to_end(&mut received))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, b"last words");

        let summary = timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert_eq!(summary.end, RelayEnd::ClientClosed);

        // The backend direction is not drained after the client half-closes.
        let _ = backend.write_all(b"too late").await;
        let mut buf = [0u8; 16];
        let n = timeout(Duration::from_secs(2), client.read(&mut buf))
            .await
            .unwrap()
            .unwrap_or(0);
        assert_eq!(n, 0);
    }

    #[test]
    fn test_relay_end_display() {
        assert_eq!(RelayEnd::ClientClosed.to_string(), "client closed");
        assert_eq!(
            RelayEnd::BackendError(io::ErrorKind::ConnectionReset).to_string(),
            format!("backend error: {}", io::ErrorKind::ConnectionReset)
        );
    }
}
