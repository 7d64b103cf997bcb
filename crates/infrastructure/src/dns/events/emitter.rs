use super::{TapEvent, TapKind};
use bypass_dns_application::ports::{InboundResponse, OutboundQuery, QueryTapPort};
use bytes::Bytes;
use tokio::sync::mpsc;

/// Query tap that forwards copies of upstream messages over a channel.
#[derive(Clone)]
pub struct ChannelQueryTap {
    sender: Option<mpsc::UnboundedSender<TapEvent>>,
}

impl ChannelQueryTap {
    pub fn new_disabled() -> Self {
        Self { sender: None }
    }

    pub fn new_enabled() -> (Self, mpsc::UnboundedReceiver<TapEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { sender: Some(tx) }, rx)
    }

    fn emit(&self, event: TapEvent) {
        if let Some(ref tx) = self.sender {
            let _ = tx.send(event);
        }
    }
}

impl QueryTapPort for ChannelQueryTap {
    fn is_enabled(&self) -> bool {
        self.sender.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    fn tap_query(&self, query: &OutboundQuery<'_>) {
        self.emit(TapEvent {
            kind: TapKind::Query,
            upstream: query.upstream,
            transport: query.transport,
            message: Bytes::copy_from_slice(query.message),
            sent_at: query.sent_at,
            received_at: None,
        });
    }

    fn tap_response(&self, response: &InboundResponse<'_>) {
        self.emit(TapEvent {
            kind: TapKind::Response,
            upstream: response.upstream,
            transport: response.transport,
            message: Bytes::copy_from_slice(response.message),
            sent_at: response.sent_at,
            received_at: Some(response.received_at),
        });
    }
}

impl Default for ChannelQueryTap {
    fn default() -> Self {
        Self::new_disabled()
    }
}

impl std::fmt::Debug for ChannelQueryTap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelQueryTap")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
