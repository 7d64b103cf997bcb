//! UDP transport (RFC 1035 §4.2.1). Messages are sent as-is; a reply with
//! the TC bit set is handed back to the caller, which decides on a TCP retry.

use super::{io_error, timeout_error, MAX_MESSAGE_SIZE};
use crate::dns::wire;
use bypass_dns_domain::DomainError;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::debug;

/// A connected UDP socket to one upstream.
pub struct UdpConnection {
    socket: UdpSocket,
    server: SocketAddr,
}

impl UdpConnection {
    pub async fn connect(server: SocketAddr) -> Result<Self, DomainError> {
        let bind_addr = if server.is_ipv4() {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
        } else {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| io_error(server, e))?;
        socket.connect(server).await.map_err(|e| io_error(server, e))?;
        Ok(Self { socket, server })
    }

    pub async fn exchange(
        &mut self,
        query: &[u8],
        id: u16,
        timeout: Duration,
    ) -> Result<Vec<u8>, DomainError> {
        let server = self.server;
        let socket = &self.socket;
        tokio::time::timeout(timeout, async move {
            socket.send(query).await.map_err(|e| io_error(server, e))?;
            let mut buf = vec![0u8; MAX_MESSAGE_SIZE];
            loop {
                let n = socket.recv(&mut buf).await.map_err(|e| io_error(server, e))?;
                let reply = &buf[..n];
                if wire::message_id(reply) == Some(id) && wire::is_response(reply) {
                    debug!(server = %server, bytes = n, "UDP response received");
                    buf.truncate(n);
                    return Ok(buf);
                }
                debug!(server = %server, bytes = n, "Discarding UDP reply with foreign ID");
            }
        })
        .await
        .map_err(|_| timeout_error(server))?
    }
}
