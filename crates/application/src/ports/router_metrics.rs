use std::net::SocketAddr;
use std::time::Duration;

/// Observational counters for the router. Implementations must not block.
pub trait RouterMetricsPort: Send + Sync {
    fn record_request(&self, to: SocketAddr);

    fn record_response(&self, to: SocketAddr, rcode: u8);

    fn observe_request_duration(&self, to: SocketAddr, elapsed: Duration);

    fn record_healthcheck_failure(&self, to: SocketAddr);

    /// Every endpoint of a pool was down and a random one was forced.
    fn record_healthcheck_broken(&self);

    fn record_max_concurrent_reject(&self);

    fn set_open_sockets(&self, to: SocketAddr, open: usize);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRouterMetrics;

impl RouterMetricsPort for NoopRouterMetrics {
    fn record_request(&self, _to: SocketAddr) {}

    fn record_response(&self, _to: SocketAddr, _rcode: u8) {}

    fn observe_request_duration(&self, _to: SocketAddr, _elapsed: Duration) {}

    fn record_healthcheck_failure(&self, _to: SocketAddr) {}

    fn record_healthcheck_broken(&self) {}

    fn record_max_concurrent_reject(&self) {}

    fn set_open_sockets(&self, _to: SocketAddr, _open: usize) {}
}
