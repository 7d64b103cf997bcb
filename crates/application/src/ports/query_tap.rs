use bypass_dns_domain::Transport;
use std::net::SocketAddr;
use std::time::SystemTime;

/// One outbound attempt, reported before its outcome is known.
#[derive(Debug, Clone, Copy)]
pub struct OutboundQuery<'a> {
    pub upstream: SocketAddr,
    pub transport: Transport,
    pub message: &'a [u8],
    pub sent_at: SystemTime,
}

/// The reply received for an [`OutboundQuery`].
#[derive(Debug, Clone, Copy)]
pub struct InboundResponse<'a> {
    pub upstream: SocketAddr,
    pub transport: Transport,
    pub message: &'a [u8],
    pub sent_at: SystemTime,
    pub received_at: SystemTime,
}

/// Telemetry sink for upstream exchanges.
///
/// The router checks [`is_enabled`](QueryTapPort::is_enabled) once per
/// attempt and builds no records when it returns `false`.
pub trait QueryTapPort: Send + Sync {
    fn is_enabled(&self) -> bool;

    fn tap_query(&self, query: &OutboundQuery<'_>);

    fn tap_response(&self, response: &InboundResponse<'_>);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopQueryTap;

impl QueryTapPort for NoopQueryTap {
    #[inline]
    fn is_enabled(&self) -> bool {
        false
    }

    #[inline]
    fn tap_query(&self, _query: &OutboundQuery<'_>) {}

    #[inline]
    fn tap_response(&self, _response: &InboundResponse<'_>) {}
}
