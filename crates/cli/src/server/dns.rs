use bypass_dns_domain::Transport;
use bypass_dns_infrastructure::dns::transport::{read_with_length_prefix, send_with_length_prefix};
use bypass_dns_infrastructure::dns::wire;
use bypass_dns_infrastructure::dns::{InboundQuery, Router};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

const UDP_RECV_BUFFER: usize = 4096;

/// Plain DNS listeners on UDP and TCP.
pub struct DnsServer {
    addr: SocketAddr,
    udp: Arc<UdpSocket>,
    tcp: TcpListener,
}

impl DnsServer {
    pub fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };
        let udp = Arc::new(create_udp_socket(domain, addr)?);
        let tcp = create_tcp_listener(domain, addr)?;
        let addr = udp.local_addr()?;
        info!(bind_address = %addr, "DNS listeners bound");
        Ok(Self { addr, udp, tcp })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serves until `shutdown` is cancelled.
    pub async fn run(
        self,
        router: Arc<Router>,
        tcp_idle_timeout: Duration,
        shutdown: CancellationToken,
    ) -> anyhow::Result<()> {
        info!(bind_address = %self.addr, "DNS server ready");

        let udp = run_udp(self.udp, Arc::clone(&router), shutdown.clone());
        let tcp = run_tcp(self.tcp, router, tcp_idle_timeout, shutdown);
        tokio::join!(udp, tcp);
        Ok(())
    }
}

async fn run_udp(socket: Arc<UdpSocket>, router: Arc<Router>, shutdown: CancellationToken) {
    let mut buf = vec![0u8; UDP_RECV_BUFFER];
    loop {
        let (n, from) = tokio::select! {
            _ = shutdown.cancelled() => break,
            r = socket.recv_from(&mut buf) => match r {
                Ok(r) => r,
                Err(e) if is_transient(&e) => continue,
                Err(e) => {
                    error!(error = %e, "UDP recv error");
                    continue;
                }
            },
        };

        let query: Arc<[u8]> = Arc::from(&buf[..n]);
        let router = Arc::clone(&router);
        let socket = Arc::clone(&socket);
        tokio::spawn(async move {
            if let Some(response) = handle_query(&router, &query, Transport::Udp).await {
                if let Err(e) = socket.send_to(&response, from).await {
                    debug!(client = %from, error = %e, "UDP send failed");
                }
            }
        });
    }
    debug!("UDP listener stopped");
}

async fn run_tcp(
    listener: TcpListener,
    router: Arc<Router>,
    idle_timeout: Duration,
    shutdown: CancellationToken,
) {
    let mut connections = JoinSet::new();
    loop {
        let (stream, peer) = tokio::select! {
            _ = shutdown.cancelled() => break,
            Some(_) = connections.join_next(), if !connections.is_empty() => continue,
            r = listener.accept() => match r {
                Ok(r) => r,
                Err(e) => {
                    debug!(error = %e, "TCP accept failed");
                    continue;
                }
            },
        };
        let _ = stream.set_nodelay(true);
        connections.spawn(serve_tcp_connection(
            stream,
            peer,
            Arc::clone(&router),
            idle_timeout,
            shutdown.clone(),
        ));
    }
    connections.shutdown().await;
    debug!("TCP listener stopped");
}

/// Queries on one connection are answered in order.
async fn serve_tcp_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    router: Arc<Router>,
    idle_timeout: Duration,
    shutdown: CancellationToken,
) {
    loop {
        let query = tokio::select! {
            _ = shutdown.cancelled() => break,
            r = tokio::time::timeout(idle_timeout, read_with_length_prefix(&mut stream)) => match r {
                Ok(Ok(query)) => query,
                Ok(Err(e)) => {
                    if e.kind() != io::ErrorKind::UnexpectedEof {
                        debug!(client = %peer, error = %e, "TCP read failed");
                    }
                    break;
                }
                Err(_) => {
                    debug!(client = %peer, "Idle TCP connection closed");
                    break;
                }
            },
        };

        let Some(response) = handle_query(&router, &query, Transport::Tcp).await else {
            continue;
        };
        if let Err(e) = send_with_length_prefix(&mut stream, &response).await {
            debug!(client = %peer, error = %e, "TCP write failed");
            break;
        }
    }
}

/// Routes one raw query and returns the bytes to send back.
///
/// Messages too short to carry a header and stray responses are dropped.
pub async fn handle_query(router: &Router, message: &[u8], transport: Transport) -> Option<Vec<u8>> {
    if message.len() < wire::HEADER_LEN || wire::is_response(message) {
        return None;
    }

    let query = match InboundQuery::parse(message, transport) {
        Ok(query) => query,
        Err(e) => {
            debug!(error = %e, "Malformed query");
            return Some(wire::error_response(message, e.response_code().code()));
        }
    };

    match router.serve(&query).await {
        Ok(answer) => Some(answer.message),
        Err(e) => {
            debug!(
                name = %query.question.name,
                qtype = query.question.qtype,
                error = %e,
                "Query failed"
            );
            Some(wire::error_response(message, e.response_code().code()))
        }
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::ConnectionReset
    )
}

fn create_udp_socket(domain: Domain, socket_addr: SocketAddr) -> anyhow::Result<UdpSocket> {
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    if socket_addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_recv_buffer_size(512 * 1024)?;
    socket.set_send_buffer_size(512 * 1024)?;
    socket.bind(&socket_addr.into())?;
    socket.set_nonblocking(true)?;
    let std_socket: std::net::UdpSocket = socket.into();
    Ok(UdpSocket::from_std(std_socket)?)
}

fn create_tcp_listener(domain: Domain, socket_addr: SocketAddr) -> anyhow::Result<TcpListener> {
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    if socket_addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(1024)?;
    socket.set_nonblocking(true)?;
    let std_listener: std::net::TcpListener = socket.into();
    Ok(TcpListener::from_std(std_listener)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bypass_dns_domain::RouterConfig;

    fn query(id: u16, name: &str) -> Vec<u8> {
        let mut msg = id.to_be_bytes().to_vec();
        msg.extend_from_slice(&[0x01, 0x00, 0, 1, 0, 0, 0, 0, 0, 0]);
        for label in name.split('.').filter(|l| !l.is_empty()) {
            msg.push(label.len() as u8);
            msg.extend_from_slice(label.as_bytes());
        }
        msg.extend_from_slice(&[0, 0, 1, 0, 1]);
        msg
    }

    fn unreachable_router() -> Router {
        let dead = std::net::UdpSocket::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let config = RouterConfig {
            forward: vec![dead.to_string()],
            timeout_ms: 300,
            ..RouterConfig::default()
        };
        Router::builder(&config).build().unwrap()
    }

    #[tokio::test]
    async fn failed_upstream_becomes_servfail() {
        let router = unreachable_router();
        let reply = handle_query(&router, &query(0x77, "example.com"), Transport::Udp)
            .await
            .unwrap();
        assert_eq!(wire::message_id(&reply), Some(0x77));
        assert_eq!(wire::rcode(&reply), wire::RCODE_SERVFAIL);
    }

    #[tokio::test]
    async fn unparsable_question_becomes_formerr() {
        let router = unreachable_router();
        let mut msg = query(0x78, "example.com");
        msg.truncate(16);
        let reply = handle_query(&router, &msg, Transport::Udp).await.unwrap();
        assert_eq!(wire::rcode(&reply), wire::RCODE_FORMERR);
    }

    #[tokio::test]
    async fn short_messages_and_responses_are_dropped() {
        let router = unreachable_router();
        assert!(handle_query(&router, &[0u8; 4], Transport::Udp).await.is_none());
        let mut msg = query(0x79, "example.com");
        msg[2] |= 0x80;
        assert!(handle_query(&router, &msg, Transport::Udp).await.is_none());
    }

    #[tokio::test]
    async fn listeners_bind_ephemeral_port() {
        let server = DnsServer::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        assert_ne!(server.local_addr().port(), 0);
    }
}
