#![allow(dead_code)]
use bypass_dns_infrastructure::dns::transport::{read_with_length_prefix, send_with_length_prefix};
use std::net::{SocketAddr, UdpSocket as StdUdpSocket};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio_util::sync::CancellationToken;

/// How the mock answers the next query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// One A record, 127.0.0.1.
    Answer,
    /// No records, given rcode.
    Rcode(u8),
    /// Read the query and never reply.
    Drop,
    /// Reply for a different qtype.
    WrongQuestion,
    /// UDP replies carry TC and no records; TCP answers normally.
    TruncateUdp,
    /// Answer after a delay.
    Slow(Duration),
    /// Answer, then close the TCP connection.
    CloseAfterAnswer,
}

/// Loopback DNS server on UDP and TCP at the same port.
pub struct MockUpstream {
    addr: SocketAddr,
    behavior: Arc<Mutex<Behavior>>,
    udp_hits: Arc<AtomicUsize>,
    tcp_hits: Arc<AtomicUsize>,
    shutdown: CancellationToken,
}

impl MockUpstream {
    pub async fn start(behavior: Behavior) -> Self {
        let udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = udp.local_addr().unwrap();
        let tcp = TcpListener::bind(addr).await.unwrap();

        let mock = Self {
            addr,
            behavior: Arc::new(Mutex::new(behavior)),
            udp_hits: Arc::new(AtomicUsize::new(0)),
            tcp_hits: Arc::new(AtomicUsize::new(0)),
            shutdown: CancellationToken::new(),
        };
        mock.spawn_udp(Arc::new(udp));
        mock.spawn_tcp(tcp);
        mock
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn udp_hits(&self) -> usize {
        self.udp_hits.load(Ordering::SeqCst)
    }

    pub fn tcp_hits(&self) -> usize {
        self.tcp_hits.load(Ordering::SeqCst)
    }

    pub fn hits(&self) -> usize {
        self.udp_hits() + self.tcp_hits()
    }

    fn spawn_udp(&self, socket: Arc<UdpSocket>) {
        let behavior = Arc::clone(&self.behavior);
        let hits = Arc::clone(&self.udp_hits);
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            loop {
                let (len, peer) = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    r = socket.recv_from(&mut buf) => match r {
                        Ok(r) => r,
                        Err(_) => continue,
                    },
                };
                hits.fetch_add(1, Ordering::SeqCst);
                let query = buf[..len].to_vec();
                let behavior = *behavior.lock().unwrap();
                let socket = Arc::clone(&socket);
                tokio::spawn(async move {
                    if let Some(reply) = respond(&query, behavior, true).await {
                        let _ = socket.send_to(&reply, peer).await;
                    }
                });
            }
        });
    }

    fn spawn_tcp(&self, listener: TcpListener) {
        let behavior = Arc::clone(&self.behavior);
        let hits = Arc::clone(&self.tcp_hits);
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            loop {
                let (mut stream, _) = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    r = listener.accept() => match r {
                        Ok(r) => r,
                        Err(_) => continue,
                    },
                };
                let behavior = Arc::clone(&behavior);
                let hits = Arc::clone(&hits);
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    loop {
                        let query = tokio::select! {
                            _ = shutdown.cancelled() => break,
                            r = read_with_length_prefix(&mut stream) => match r {
                                Ok(q) => q,
                                Err(_) => break,
                            },
                        };
                        hits.fetch_add(1, Ordering::SeqCst);
                        let behavior = *behavior.lock().unwrap();
                        if let Some(reply) = respond(&query, behavior, false).await {
                            if send_with_length_prefix(&mut stream, &reply).await.is_err() {
                                break;
                            }
                        }
                        if behavior == Behavior::CloseAfterAnswer {
                            break;
                        }
                    }
                });
            }
        });
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// A loopback port with nothing listening on it.
pub fn closed_port() -> SocketAddr {
    let socket = StdUdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap()
}

async fn respond(query: &[u8], behavior: Behavior, udp: bool) -> Option<Vec<u8>> {
    match behavior {
        Behavior::Answer | Behavior::CloseAfterAnswer => Some(reply(query, 0, true, false)),
        Behavior::Rcode(rcode) => Some(reply(query, rcode, false, false)),
        Behavior::Drop => None,
        Behavior::WrongQuestion => {
            let mut r = reply(query, 0, false, false);
            let qtype_at = question_end(query)? - 4;
            r[qtype_at] ^= 0xFF;
            Some(r)
        }
        Behavior::TruncateUdp if udp => Some(reply(query, 0, false, true)),
        Behavior::TruncateUdp => Some(reply(query, 0, true, false)),
        Behavior::Slow(delay) => {
            tokio::time::sleep(delay).await;
            Some(reply(query, 0, true, false))
        }
    }
}

fn question_end(query: &[u8]) -> Option<usize> {
    let mut pos = 12;
    loop {
        let len = *query.get(pos)? as usize;
        pos += 1;
        if len == 0 {
            break;
        }
        pos += len;
    }
    (pos + 4 <= query.len()).then_some(pos + 4)
}

fn reply(query: &[u8], rcode: u8, with_answer: bool, truncated: bool) -> Vec<u8> {
    let end = question_end(query).unwrap_or(query.len().min(12));
    let mut r = Vec::with_capacity(end + 16);
    r.extend_from_slice(&query[0..2]);
    r.push(0x80 | (query[2] & 0x01) | if truncated { 0x02 } else { 0 });
    r.push(0x80 | (rcode & 0x0F));
    r.extend_from_slice(&[0, 1]);
    r.extend_from_slice(&[0, if with_answer { 1 } else { 0 }]);
    r.extend_from_slice(&[0, 0, 0, 0]);
    r.extend_from_slice(&query[12..end]);
    if with_answer {
        r.extend_from_slice(&[
            0xc0, 0x0c, // name pointer
            0x00, 0x01, // A
            0x00, 0x01, // IN
            0x00, 0x00, 0x00, 0x3c, // ttl
            0x00, 0x04, 127, 0, 0, 1,
        ]);
    }
    r
}
