//! A TCP listener that logs every chunk of bytes a client sends.
//!
//! Clients are served one at a time; nothing is ever written back.

use std::io;
use std::net::SocketAddr;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{debug, info, warn};

use crate::config::RelayConfig;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("invalid relay address: {0}")]
    Address(String),
    #[error("failed to create socket: {0}")]
    Socket(#[source] io::Error),
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        source: io::Error,
    },
    #[error("failed to listen: {0}")]
    Listen(#[source] io::Error),
    #[error("failed to accept: {0}")]
    Accept(#[source] io::Error),
}

/// Receives each non-empty read from a client.
pub trait ChunkSink: Send {
    fn receive(&mut self, peer: SocketAddr, chunk: &[u8]);
}

/// Logs the byte count and the bytes in hexadecimal.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl ChunkSink for LogSink {
    fn receive(&mut self, peer: SocketAddr, chunk: &[u8]) {
        info!(%peer, len = chunk.len(), "received {}", format_chunk(chunk));
    }
}

/// Renders bytes as `0x1, 0x2, 0xff`.
pub fn format_chunk(chunk: &[u8]) -> String {
    chunk
        .iter()
        .map(|byte| format!("0x{:x}", byte))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Accept errors after which the listener is still usable.
fn is_recoverable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::TimedOut
    )
}

pub struct RelayServer<S = LogSink> {
    listener: TcpListener,
    buffer_size: usize,
    sink: S,
}

impl RelayServer<LogSink> {
    pub fn bind(config: &RelayConfig) -> Result<Self, RelayError> {
        Self::bind_with_sink(config, LogSink)
    }
}

impl<S: ChunkSink> RelayServer<S> {
    pub fn bind_with_sink(config: &RelayConfig, sink: S) -> Result<Self, RelayError> {
        let address: SocketAddr = config
            .address
            .parse()
            .map_err(|_| RelayError::Address(config.address.clone()))?;
        let socket = match address {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(RelayError::Socket)?;
        socket.set_reuseaddr(true).map_err(RelayError::Socket)?;
        socket
            .bind(address)
            .map_err(|source| RelayError::Bind { address, source })?;
        let listener = socket.listen(config.backlog).map_err(RelayError::Listen)?;
        info!(%address, backlog = config.backlog, "relay listening");
        Ok(Self {
            listener,
            buffer_size: config.buffer_size,
            sink,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves clients until accepting fails for good.
    pub async fn serve(&mut self) -> Result<(), RelayError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    info!(%peer, "client connected");
                    self.relay(stream, peer).await;
                }
                Err(err) if is_recoverable(&err) => warn!(%err, "accept failed, still listening"),
                Err(err) => return Err(RelayError::Accept(err)),
            }
        }
    }

    async fn relay(&mut self, mut stream: TcpStream, peer: SocketAddr) {
        let mut buf = vec![0u8; self.buffer_size];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) => {
                    info!(%peer, "client disconnected");
                    break;
                }
                Ok(len) => self.sink.receive(peer, &buf[..len]),
                Err(err) => {
                    warn!(%peer, %err, "receive failed");
                    break;
                }
            }
        }
        debug!(%peer, "connection closed");
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;
    use tokio::sync::mpsc;

    use super::*;

    struct ChannelSink(mpsc::UnboundedSender<Vec<u8>>);

    impl ChunkSink for ChannelSink {
        fn receive(&mut self, _peer: SocketAddr, chunk: &[u8]) {
            self.0.send(chunk.to_vec()).unwrap();
        }
    }

    fn local_config() -> RelayConfig {
        RelayConfig {
            address: "127.0.0.1:0".to_owned(),
            ..RelayConfig::default()
        }
    }

    async fn send(address: SocketAddr, bytes: &[u8]) {
        let mut client = TcpStream::connect(address).await.unwrap();
        client.write_all(bytes).await.unwrap();
        client.shutdown().await.unwrap();
    }

    #[test]
    fn test_format_chunk() {
        assert_eq!(format_chunk(&[0x01, 0x02, 0xFF]), "0x1, 0x2, 0xff");
        assert_eq!(format_chunk(&[0x00]), "0x0");
        assert_eq!(format_chunk(&[]), "");
    }

    #[test]
    fn test_is_recoverable() {
        assert!(is_recoverable(&io::ErrorKind::ConnectionAborted.into()));
        assert!(is_recoverable(&io::ErrorKind::Interrupted.into()));
        assert!(!is_recoverable(&io::Error::from_raw_os_error(libc::EMFILE)));
        assert!(!is_recoverable(&io::ErrorKind::PermissionDenied.into()));
    }

    #[tokio::test]
    async fn test_relay_chunks_from_sequential_clients() {
        let (sender, mut chunks) = mpsc::unbounded_channel();
        let mut server = RelayServer::bind_with_sink(&local_config(), ChannelSink(sender)).unwrap();
        let address = server.local_addr().unwrap();
        let serving = tokio::spawn(async move { server.serve().await });

        send(address, &[0x01, 0x02, 0xFF]).await;
        assert_eq!(chunks.recv().await, Some(vec![0x01, 0x02, 0xFF]));

        send(address, b"hi").await;
        assert_eq!(chunks.recv().await, Some(b"hi".to_vec()));

        assert!(!serving.is_finished());
        serving.abort();
    }

    #[tokio::test]
    async fn test_bind_rejects_bad_address() {
        let config = RelayConfig {
            address: "localhost".to_owned(),
            ..RelayConfig::default()
        };
        assert!(matches!(
            RelayServer::bind(&config),
            Err(RelayError::Address(_))
        ));
    }
}
