//! Query router: classifies each query against the bypass domain list and
//! forwards it to the `pass` or `forward` pool with failover.

pub mod admission;

use crate::dns::domain_list::{empty_shared_list, SharedDomainList};
use crate::dns::load_balancer::{ConnectOptions, Endpoint, EndpointConfig, Exchange, SelectionPolicy};
use crate::dns::transport::TlsDialer;
use crate::dns::wire::{self, Question};
use admission::Admission;
use bypass_dns_application::ports::{
    InboundResponse, NoopQueryTap, NoopRouterMetrics, OutboundQuery, QueryTapPort,
    RouterMetricsPort,
};
use bypass_dns_domain::config::{RouterConfig, MAX_UPSTREAMS};
use bypass_dns_domain::{fqdn, DnsProtocol, DomainError, PolicyKind, Transport};
use futures::future::join_all;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, warn};

/// Wall-clock bound on one query's failover loop.
pub const FAILOVER_DEADLINE: Duration = Duration::from_secs(5);

/// A client query as received by the serving surface.
#[derive(Debug, Clone)]
pub struct InboundQuery<'a> {
    pub message: &'a [u8],
    pub question: Question,
    pub transport: Transport,
}

impl<'a> InboundQuery<'a> {
    pub fn parse(message: &'a [u8], transport: Transport) -> Result<Self, DomainError> {
        let question = wire::parse_question(message)?;
        Ok(Self {
            message,
            question,
            transport,
        })
    }
}

/// Bytes to write back to the client.
#[derive(Debug, Clone)]
pub struct Answer {
    pub message: Vec<u8>,
    pub rcode: u8,
    pub upstream: Option<SocketAddr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pool {
    Pass,
    Forward,
}

impl Pool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Forward => "forward",
        }
    }
}

pub struct Router {
    zone: String,
    pass: Vec<Arc<Endpoint>>,
    forward: Vec<Arc<Endpoint>>,
    policy: SelectionPolicy,
    domains: SharedDomainList,
    opts: ConnectOptions,
    max_fails: u32,
    health_check_interval: Duration,
    admission: Admission,
    tap: Arc<dyn QueryTapPort>,
    metrics: Arc<dyn RouterMetricsPort>,
}

pub struct RouterBuilder {
    config: RouterConfig,
    domains: Option<SharedDomainList>,
    tap: Arc<dyn QueryTapPort>,
    metrics: Arc<dyn RouterMetricsPort>,
}

impl RouterBuilder {
    pub fn with_domains(mut self, domains: SharedDomainList) -> Self {
        self.domains = Some(domains);
        self
    }

    pub fn with_tap(mut self, tap: Arc<dyn QueryTapPort>) -> Self {
        self.tap = tap;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn RouterMetricsPort>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn build(self) -> Result<Router, DomainError> {
        let config = self.config;
        let zone = config.normalized_zone()?;

        let endpoint_config = EndpointConfig {
            timeout: config.timeout(),
            expire: config.expire(),
            probe_recursion_desired: config.health_check_recursion_desired,
            tls: TlsDialer::from_config(&config.tls)?,
            metrics: Arc::clone(&self.metrics),
        };
        let pass = build_pool("pass", config.pass_endpoints()?, &endpoint_config)?;
        let forward = build_pool("forward", config.forward_endpoints()?, &endpoint_config)?;

        Ok(Router {
            zone,
            pass,
            forward,
            policy: SelectionPolicy::new(config.policy),
            domains: self.domains.unwrap_or_else(empty_shared_list),
            opts: ConnectOptions {
                force_tcp: config.force_tcp,
                prefer_udp: config.prefer_udp,
            },
            max_fails: config.max_fails,
            health_check_interval: config.health_check_interval(),
            admission: Admission::new(config.max_concurrent),
            tap: self.tap,
            metrics: self.metrics,
        })
    }
}

fn build_pool(
    name: &str,
    protocols: Vec<DnsProtocol>,
    config: &EndpointConfig,
) -> Result<Vec<Arc<Endpoint>>, DomainError> {
    if protocols.len() > MAX_UPSTREAMS {
        return Err(DomainError::ConfigError(format!(
            "more than {} {} upstreams configured: {}",
            MAX_UPSTREAMS,
            name,
            protocols.len()
        )));
    }
    Ok(protocols
        .into_iter()
        .map(|p| Arc::new(Endpoint::new(p, config)))
        .collect())
}

impl Router {
    pub fn builder(config: &RouterConfig) -> RouterBuilder {
        RouterBuilder {
            config: config.clone(),
            domains: None,
            tap: Arc::new(NoopQueryTap),
            metrics: Arc::new(NoopRouterMetrics),
        }
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn pass_len(&self) -> usize {
        self.pass.len()
    }

    pub fn forward_len(&self) -> usize {
        self.forward.len()
    }

    pub fn pass_endpoints(&self) -> &[Arc<Endpoint>] {
        &self.pass
    }

    pub fn forward_endpoints(&self) -> &[Arc<Endpoint>] {
        &self.forward
    }

    pub fn force_tcp(&self) -> bool {
        self.opts.force_tcp
    }

    pub fn prefer_udp(&self) -> bool {
        self.opts.prefer_udp
    }

    pub fn policy(&self) -> PolicyKind {
        self.policy.kind()
    }

    pub fn active_domain_count(&self) -> usize {
        self.domains.load().set.len()
    }

    pub fn in_flight(&self) -> u64 {
        self.admission.in_flight()
    }

    /// Pool a query name is routed to. The zone apex always goes to `pass`.
    pub fn classify(&self, name: &str) -> Pool {
        if !fqdn::is_subdomain_of(name, &self.zone) {
            return Pool::Forward;
        }
        if name.eq_ignore_ascii_case(&self.zone) || self.domains.load().set.contains(name) {
            Pool::Pass
        } else {
            Pool::Forward
        }
    }

    fn pool(&self, pool: Pool) -> &[Arc<Endpoint>] {
        match pool {
            Pool::Pass => &self.pass,
            Pool::Forward => &self.forward,
        }
    }

    /// Starts every endpoint's health probe task.
    pub fn start(&self) {
        for endpoint in self.pass.iter().chain(&self.forward) {
            endpoint.start(self.health_check_interval);
        }
    }

    /// Stops every probe task and waits for them to finish.
    pub async fn close(&self) {
        join_all(self.pass.iter().chain(&self.forward).map(|e| e.close())).await;
    }

    /// Forwards one query.
    ///
    /// A reply that does not answer the query comes back as an `Ok` FORMERR
    /// answer. Every `Err` should be written to the client as SERVFAIL.
    pub async fn serve(&self, query: &InboundQuery<'_>) -> Result<Answer, DomainError> {
        let _slot = match self.admission.try_admit() {
            Ok(slot) => slot,
            Err(e) => {
                self.metrics.record_max_concurrent_reject();
                debug!(name = %query.question.name, error = %e, "Query rejected");
                return Err(e);
            }
        };

        let pool = self.classify(&query.question.name);
        let endpoints = self.pool(pool);
        if endpoints.is_empty() {
            return Err(DomainError::NoUpstreamDefined(pool.as_str()));
        }
        debug!(
            name = %query.question.name,
            qtype = query.question.qtype,
            pool = pool.as_str(),
            "Routing query"
        );

        self.forward_with_failover(query, endpoints).await
    }

    async fn forward_with_failover(
        &self,
        query: &InboundQuery<'_>,
        pool: &[Arc<Endpoint>],
    ) -> Result<Answer, DomainError> {
        let list = self.policy.list(pool);
        let deadline = Instant::now() + FAILOVER_DEADLINE;
        let mut upstream_err: Option<DomainError> = None;
        let mut fails = 0;
        let mut i = 0;

        while Instant::now() < deadline {
            if i >= list.len() {
                i = 0;
                fails = 0;
            }

            let mut endpoint = list[i];
            i += 1;
            if endpoint.down(self.max_fails) {
                fails += 1;
                if fails < list.len() {
                    continue;
                }
                endpoint = list[fastrand::usize(..list.len())];
                self.metrics.record_healthcheck_broken();
                warn!(
                    server = %endpoint.addr(),
                    "All upstreams marked down, health checking looks broken; trying a random one"
                );
            }

            match self.exchange(endpoint, query).await {
                Ok(exchange) => {
                    if !wire::matches_query(&query.question, &exchange.response) {
                        debug!(
                            server = %endpoint.addr(),
                            id = wire::message_id(&exchange.response),
                            name = %query.question.name,
                            qtype = query.question.qtype,
                            "Wrong reply for query"
                        );
                        return Ok(Answer {
                            message: wire::error_response(query.message, wire::RCODE_FORMERR),
                            rcode: wire::RCODE_FORMERR,
                            upstream: Some(endpoint.addr()),
                        });
                    }
                    return Ok(Answer {
                        rcode: wire::rcode(&exchange.response),
                        message: exchange.response,
                        upstream: Some(endpoint.addr()),
                    });
                }
                Err(e) => {
                    debug!(server = %endpoint.addr(), error = %e, "Upstream exchange failed");
                    if self.max_fails != 0 {
                        let count = endpoint.record_failure();
                        if count == self.max_fails {
                            warn!(server = %endpoint.addr(), fails = count, "Server marked UNHEALTHY");
                        }
                        endpoint.healthcheck();
                    }
                    upstream_err = Some(e);
                    fails += 1;
                    if fails < list.len() {
                        continue;
                    }
                    break;
                }
            }
        }

        Err(upstream_err.unwrap_or(DomainError::TransportNoHealthyServers))
    }

    /// One endpoint attempt, including the immediate retries for a closed
    /// cached connection and for a truncated UDP reply.
    async fn exchange(
        &self,
        endpoint: &Endpoint,
        query: &InboundQuery<'_>,
    ) -> Result<Exchange, DomainError> {
        let addr = endpoint.addr();
        let mut opts = self.opts;
        loop {
            let transport = endpoint.transport_for(opts, query.transport);
            let sent_at = SystemTime::now();
            let started = Instant::now();
            self.metrics.record_request(addr);

            let result = endpoint.connect(query.message, opts, query.transport).await;
            self.emit_tap(addr, transport, query.message, sent_at, result.as_ref().ok());

            match result {
                Err(DomainError::CachedConnectionClosed) => continue,
                Ok(exchange)
                    if exchange.transport == Transport::Udp
                        && wire::is_truncated(&exchange.response)
                        && !opts.force_tcp
                        && opts.prefer_udp =>
                {
                    debug!(server = %addr, "Truncated UDP reply, retrying over TCP");
                    opts.force_tcp = true;
                    continue;
                }
                Ok(exchange) => {
                    self.metrics
                        .record_response(addr, wire::rcode(&exchange.response));
                    self.metrics
                        .observe_request_duration(addr, started.elapsed());
                    return Ok(exchange);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn emit_tap(
        &self,
        upstream: SocketAddr,
        transport: Transport,
        query: &[u8],
        sent_at: SystemTime,
        reply: Option<&Exchange>,
    ) {
        if !self.tap.is_enabled() {
            return;
        }
        self.tap.tap_query(&OutboundQuery {
            upstream,
            transport,
            message: query,
            sent_at,
        });
        if let Some(reply) = reply {
            self.tap.tap_response(&InboundResponse {
                upstream,
                transport: reply.transport,
                message: &reply.response,
                sent_at,
                received_at: SystemTime::now(),
            });
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("zone", &self.zone)
            .field("pass", &self.pass.len())
            .field("forward", &self.forward.len())
            .field("policy", &self.policy.kind())
            .field("max_fails", &self.max_fails)
            .finish()
    }
}
