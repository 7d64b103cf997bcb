use super::{io_error, timeout_error};
use crate::dns::wire;
use bypass_dns_domain::DomainError;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Length-prefixed DNS over a byte stream (plain TCP or TLS).
pub struct StreamConnection<S> {
    stream: S,
    server: SocketAddr,
}

pub(crate) async fn dial_tcp(server: SocketAddr, timeout: Duration) -> Result<TcpStream, DomainError> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect(server))
        .await
        .map_err(|_| timeout_error(server))?
        .map_err(|e| io_error(server, e))?;
    stream.set_nodelay(true).map_err(|e| io_error(server, e))?;
    Ok(stream)
}

impl StreamConnection<TcpStream> {
    pub async fn connect_tcp(server: SocketAddr, timeout: Duration) -> Result<Self, DomainError> {
        let stream = dial_tcp(server, timeout).await?;
        debug!(server = %server, "TCP connection established");
        Ok(Self { stream, server })
    }
}

impl<S> StreamConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, server: SocketAddr) -> Self {
        Self { stream, server }
    }

    pub async fn exchange(
        &mut self,
        query: &[u8],
        id: u16,
        timeout: Duration,
    ) -> Result<Vec<u8>, DomainError> {
        let server = self.server;
        let stream = &mut self.stream;
        tokio::time::timeout(timeout, async move {
            send_with_length_prefix(stream, query)
                .await
                .map_err(|e| io_error(server, e))?;
            loop {
                let reply = read_with_length_prefix(stream)
                    .await
                    .map_err(|e| io_error(server, e))?;
                if wire::message_id(&reply) == Some(id) && wire::is_response(&reply) {
                    return Ok(reply);
                }
                debug!(server = %server, "Discarding stream reply with foreign ID");
            }
        })
        .await
        .map_err(|_| timeout_error(server))?
    }
}

pub async fn send_with_length_prefix<S>(stream: &mut S, message_bytes: &[u8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let length = u16::try_from(message_bytes.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "DNS message too large"))?;
    let mut frame = Vec::with_capacity(2 + message_bytes.len());
    frame.extend_from_slice(&length.to_be_bytes());
    frame.extend_from_slice(message_bytes);
    stream.write_all(&frame).await?;
    stream.flush().await
}

pub async fn read_with_length_prefix<S>(stream: &mut S) -> io::Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await?;

    let len = u16::from_be_bytes(len_buf) as usize;
    let mut message = vec![0u8; len];
    stream.read_exact(&mut message).await?;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn length_prefix_roundtrip_over_duplex() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        send_with_length_prefix(&mut a, b"hello").await.unwrap();
        assert_eq!(read_with_length_prefix(&mut b).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn eof_mid_frame_is_unexpected_eof() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&[0, 10, 1, 2]).await.unwrap();
        drop(a);
        let err = read_with_length_prefix(&mut b).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
