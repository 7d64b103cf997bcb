use bypass_dns_application::ports::RouterMetricsPort;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamStats {
    pub requests: u64,
    pub responses: u64,
    pub healthcheck_failures: u64,
    pub open_sockets: u64,
    pub total_duration_us: u64,
}

impl UpstreamStats {
    pub fn avg_duration_ms(&self) -> f64 {
        if self.responses == 0 {
            return 0.0;
        }
        self.total_duration_us as f64 / self.responses as f64 / 1000.0
    }
}

/// Lock-free in-process router counters.
#[derive(Clone, Default)]
pub struct InMemoryRouterMetrics {
    healthcheck_broken: Arc<AtomicU64>,

    max_concurrent_rejects: Arc<AtomicU64>,

    upstreams: Arc<DashMap<SocketAddr, UpstreamStats>>,

    rcode_counts: Arc<DashMap<u8, u64>>,
}

impl InMemoryRouterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_upstream(&self, to: SocketAddr, f: impl FnOnce(&mut UpstreamStats)) {
        f(&mut self.upstreams.entry(to).or_default());
    }

    pub fn upstream(&self, to: SocketAddr) -> UpstreamStats {
        self.upstreams.get(&to).map(|s| *s).unwrap_or_default()
    }

    pub fn requests_total(&self) -> u64 {
        self.upstreams.iter().map(|s| s.requests).sum()
    }

    pub fn responses_total(&self) -> u64 {
        self.upstreams.iter().map(|s| s.responses).sum()
    }

    pub fn rcode_count(&self, rcode: u8) -> u64 {
        self.rcode_counts.get(&rcode).map(|v| *v).unwrap_or(0)
    }

    pub fn healthcheck_broken(&self) -> u64 {
        self.healthcheck_broken.load(Ordering::Relaxed)
    }

    pub fn max_concurrent_rejects(&self) -> u64 {
        self.max_concurrent_rejects.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.healthcheck_broken.store(0, Ordering::Relaxed);
        self.max_concurrent_rejects.store(0, Ordering::Relaxed);
        self.upstreams.clear();
        self.rcode_counts.clear();
    }
}

impl RouterMetricsPort for InMemoryRouterMetrics {
    fn record_request(&self, to: SocketAddr) {
        self.with_upstream(to, |s| s.requests += 1);
    }

    fn record_response(&self, to: SocketAddr, rcode: u8) {
        self.with_upstream(to, |s| s.responses += 1);
        *self.rcode_counts.entry(rcode).or_insert(0) += 1;
    }

    fn observe_request_duration(&self, to: SocketAddr, elapsed: Duration) {
        self.with_upstream(to, |s| s.total_duration_us += elapsed.as_micros() as u64);
    }

    fn record_healthcheck_failure(&self, to: SocketAddr) {
        self.with_upstream(to, |s| s.healthcheck_failures += 1);
    }

    fn record_healthcheck_broken(&self) {
        self.healthcheck_broken.fetch_add(1, Ordering::Relaxed);
    }

    fn record_max_concurrent_reject(&self) {
        self.max_concurrent_rejects.fetch_add(1, Ordering::Relaxed);
    }

    fn set_open_sockets(&self, to: SocketAddr, open: usize) {
        self.with_upstream(to, |s| s.open_sockets = open as u64);
    }
}

impl std::fmt::Debug for InMemoryRouterMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRouterMetrics")
            .field("upstreams", &self.upstreams.len())
            .field("healthcheck_broken", &self.healthcheck_broken())
            .field("max_concurrent_rejects", &self.max_concurrent_rejects())
            .finish()
    }
}
