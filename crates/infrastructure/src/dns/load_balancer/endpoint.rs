use super::conn_cache::{ConnectionCache, TrackedConnection};
use super::health::{self, HealthTask};
use crate::dns::forwarding::MessageBuilder;
use crate::dns::transport::{Connection, TlsDialer};
use bypass_dns_application::ports::RouterMetricsPort;
use bypass_dns_domain::{DnsProtocol, DomainError, Transport};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Per-query transport options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Always use TCP for plain endpoints; wins over `prefer_udp`.
    pub force_tcp: bool,
    /// Use UDP for plain endpoints even when the client came over TCP.
    pub prefer_udp: bool,
}

/// Settings shared by every endpoint of a router.
#[derive(Clone)]
pub struct EndpointConfig {
    pub timeout: Duration,
    pub expire: Duration,
    pub probe_recursion_desired: bool,
    pub tls: TlsDialer,
    pub metrics: Arc<dyn RouterMetricsPort>,
}

/// A reply and the wire transport it came over.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub response: Vec<u8>,
    pub transport: Transport,
}

/// One upstream resolver: address, transport, idle connections and a
/// consecutive-failure counter.
pub struct Endpoint {
    protocol: DnsProtocol,
    addr: SocketAddr,
    fails: AtomicU32,
    cache: ConnectionCache,
    open: Arc<AtomicUsize>,
    tls: TlsDialer,
    timeout: Duration,
    probe_recursion_desired: bool,
    pub(super) metrics: Arc<dyn RouterMetricsPort>,
    pub(super) wake: Notify,
    health: Mutex<Option<HealthTask>>,
}

impl Endpoint {
    pub fn new(protocol: DnsProtocol, config: &EndpointConfig) -> Self {
        let addr = protocol.socket_addr();
        Self {
            protocol,
            addr,
            fails: AtomicU32::new(0),
            cache: ConnectionCache::new(config.expire),
            open: Arc::new(AtomicUsize::new(0)),
            tls: config.tls.clone(),
            timeout: config.timeout,
            probe_recursion_desired: config.probe_recursion_desired,
            metrics: Arc::clone(&config.metrics),
            wake: Notify::new(),
            health: Mutex::new(None),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn protocol(&self) -> &DnsProtocol {
        &self.protocol
    }

    pub fn fails(&self) -> u32 {
        self.fails.load(Ordering::Relaxed)
    }

    /// True when the failure count reached `max_fails`. `0` disables gating.
    pub fn down(&self, max_fails: u32) -> bool {
        max_fails != 0 && self.fails() >= max_fails
    }

    /// Returns the count after incrementing.
    pub fn record_failure(&self) -> u32 {
        self.fails.fetch_add(1, Ordering::Relaxed).saturating_add(1)
    }

    /// Returns the count before the reset.
    pub fn reset_failures(&self) -> u32 {
        self.fails.swap(0, Ordering::Relaxed)
    }

    /// Wire transport for one attempt.
    pub fn transport_for(&self, opts: ConnectOptions, inbound: Transport) -> Transport {
        match self.protocol {
            DnsProtocol::Tls { .. } => Transport::Tls,
            DnsProtocol::Tcp { .. } => Transport::Tcp,
            DnsProtocol::Udp { .. } if opts.force_tcp => Transport::Tcp,
            DnsProtocol::Udp { .. } if opts.prefer_udp => Transport::Udp,
            DnsProtocol::Udp { .. } => match inbound {
                Transport::Udp => Transport::Udp,
                Transport::Tcp | Transport::Tls => Transport::Tcp,
            },
        }
    }

    fn default_transport(&self) -> Transport {
        self.transport_for(ConnectOptions::default(), Transport::Udp)
    }

    fn report_open(&self) {
        self.metrics
            .set_open_sockets(self.addr, self.open.load(Ordering::Relaxed));
    }

    async fn dial(&self, transport: Transport) -> Result<TrackedConnection, DomainError> {
        let conn = Connection::dial(
            transport,
            self.addr,
            &self.tls,
            self.protocol.hostname(),
            self.timeout,
        )
        .await?;
        let conn = TrackedConnection::new(conn, Arc::clone(&self.open));
        self.report_open();
        Ok(conn)
    }

    /// Sends `query` and returns the reply with the same ID.
    ///
    /// A stream connection taken from the cache that turns out to be closed
    /// by the peer yields [`DomainError::CachedConnectionClosed`]; the caller
    /// should retry, which dials a fresh connection once the cache is drained.
    pub async fn connect(
        &self,
        query: &[u8],
        opts: ConnectOptions,
        inbound: Transport,
    ) -> Result<Exchange, DomainError> {
        let transport = self.transport_for(opts, inbound);
        let (mut conn, cached) = match self.cache.checkout(transport) {
            Some(conn) => (conn, true),
            None => (self.dial(transport).await?, false),
        };

        let result = conn.get_mut().exchange(query, self.timeout).await;
        match result {
            Ok(response) => {
                self.cache.give_back(conn);
                self.report_open();
                Ok(Exchange {
                    response,
                    transport,
                })
            }
            Err(e) => {
                drop(conn);
                self.report_open();
                if cached
                    && transport.is_stream()
                    && matches!(e, DomainError::TransportConnectionReset { .. })
                {
                    debug!(server = %self.addr, %transport, "Cached connection closed by peer");
                    return Err(DomainError::CachedConnectionClosed);
                }
                Err(e)
            }
        }
    }

    /// `. IN NS` over a fresh connection; any well-formed reply is success.
    pub async fn probe(&self) -> Result<(), DomainError> {
        let query = MessageBuilder::build_probe(self.probe_recursion_desired)?;
        let mut conn = Connection::dial(
            self.default_transport(),
            self.addr,
            &self.tls,
            self.protocol.hostname(),
            self.timeout,
        )
        .await?;
        let reply = conn.exchange(&query, self.timeout).await?;
        if MessageBuilder::is_well_formed_reply(&reply) {
            Ok(())
        } else {
            Err(DomainError::InvalidDnsResponse(format!(
                "malformed probe reply from {}",
                self.addr
            )))
        }
    }

    /// Wakes the probe task. Never blocks; a no-op before [`start`](Self::start).
    pub fn healthcheck(&self) {
        self.wake.notify_one();
    }

    pub(super) fn sweep_idle(&self) {
        self.cache.sweep();
        self.report_open();
    }

    /// Spawns the probe task. Calling it again while running does nothing.
    pub fn start(self: &Arc<Self>, interval: Duration) {
        let mut slot = match self.health.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if slot.is_some() {
            return;
        }
        self.cache.reopen();
        let token = CancellationToken::new();
        let handle = tokio::spawn(health::run_health_loop(
            Arc::clone(self),
            interval,
            token.clone(),
        ));
        *slot = Some(HealthTask { token, handle });
    }

    /// Stops the probe task, waits for it, and drops idle connections.
    /// Exchanges still in flight close their connection instead of caching it.
    pub async fn close(&self) {
        let task = match self.health.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(task) = task {
            task.stop().await;
        }
        self.cache.close();
        self.report_open();
    }

    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("protocol", &self.protocol)
            .field("fails", &self.fails())
            .finish()
    }
}
