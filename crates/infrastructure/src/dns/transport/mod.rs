pub mod tcp;
pub mod tls;
pub mod udp;

use super::wire;
use bypass_dns_domain::{DomainError, Transport};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

pub use tcp::{read_with_length_prefix, send_with_length_prefix, StreamConnection};
pub use tls::TlsDialer;
pub use udp::UdpConnection;

/// Maximum DNS message size on any transport.
pub const MAX_MESSAGE_SIZE: usize = 65535;

/// An open upstream connection of one wire transport.
pub enum Connection {
    Udp(UdpConnection),
    Tcp(StreamConnection<TcpStream>),
    Tls(Box<StreamConnection<TlsStream<TcpStream>>>),
}

impl Connection {
    pub async fn dial(
        transport: Transport,
        server: SocketAddr,
        tls: &TlsDialer,
        server_name: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        match transport {
            Transport::Udp => UdpConnection::connect(server).await.map(Self::Udp),
            Transport::Tcp => StreamConnection::<TcpStream>::connect_tcp(server, timeout)
                .await
                .map(Self::Tcp),
            Transport::Tls => {
                let name = server_name.map(str::to_string).unwrap_or_else(|| server.ip().to_string());
                tls.connect(server, &name, timeout)
                    .await
                    .map(|c| Self::Tls(Box::new(c)))
            }
        }
    }

    pub fn transport(&self) -> Transport {
        match self {
            Self::Udp(_) => Transport::Udp,
            Self::Tcp(_) => Transport::Tcp,
            Self::Tls(_) => Transport::Tls,
        }
    }

    /// Sends `query` and waits for the reply carrying the same message ID.
    /// Replies with other IDs are dropped; the whole exchange is bounded by `timeout`.
    pub async fn exchange(&mut self, query: &[u8], timeout: Duration) -> Result<Vec<u8>, DomainError> {
        let id = wire::message_id(query)
            .ok_or_else(|| DomainError::InvalidDnsMessage("query shorter than header".into()))?;
        match self {
            Self::Udp(c) => c.exchange(query, id, timeout).await,
            Self::Tcp(c) => c.exchange(query, id, timeout).await,
            Self::Tls(c) => c.exchange(query, id, timeout).await,
        }
    }
}

pub(crate) fn io_error(server: SocketAddr, e: io::Error) -> DomainError {
    let server = server.to_string();
    match e.kind() {
        io::ErrorKind::ConnectionRefused => DomainError::TransportConnectionRefused { server },
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => DomainError::TransportConnectionReset { server },
        io::ErrorKind::TimedOut => DomainError::TransportTimeout { server },
        _ => DomainError::TransportIo {
            server,
            message: e.to_string(),
        },
    }
}

pub(crate) fn timeout_error(server: SocketAddr) -> DomainError {
    DomainError::TransportTimeout {
        server: server.to_string(),
    }
}
