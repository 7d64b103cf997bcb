use bypass_dns_domain::Transport;
use bytes::Bytes;
use std::net::SocketAddr;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapKind {
    Query,
    Response,
}

impl TapKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Response => "response",
        }
    }
}

/// Owned copy of one tapped upstream message.
#[derive(Debug, Clone)]
pub struct TapEvent {
    pub kind: TapKind,
    pub upstream: SocketAddr,
    pub transport: Transport,
    pub message: Bytes,
    pub sent_at: SystemTime,
    /// Set for responses only.
    pub received_at: Option<SystemTime>,
}

impl TapEvent {
    pub fn is_response(&self) -> bool {
        self.kind == TapKind::Response
    }

    pub fn round_trip_us(&self) -> Option<u64> {
        let received = self.received_at?;
        received
            .duration_since(self.sent_at)
            .ok()
            .map(|d| d.as_micros() as u64)
    }
}
