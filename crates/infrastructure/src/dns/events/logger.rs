use super::TapEvent;
use crate::dns::wire;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Writes tapped upstream messages to the log at debug level.
#[derive(Debug, Default)]
pub struct TapEventLogger;

impl TapEventLogger {
    pub fn new() -> Self {
        Self
    }

    /// Consumes events until every sender is gone or `shutdown` fires.
    /// Events already queued at shutdown are still logged. The handle yields
    /// the number of events logged.
    pub fn start(
        self,
        mut rx: mpsc::UnboundedReceiver<TapEvent>,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<u64> {
        tokio::spawn(async move {
            debug!("TapEventLogger: Starting consumer");
            let mut total_events = 0u64;

            loop {
                let event = tokio::select! {
                    biased;
                    event = rx.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                    _ = shutdown.cancelled() => {
                        rx.close();
                        while let Ok(event) = rx.try_recv() {
                            total_events += 1;
                            Self::log(&event);
                        }
                        break;
                    }
                };
                total_events += 1;
                Self::log(&event);
            }

            debug!(total_events, "TapEventLogger: Consumer shutting down");
            total_events
        })
    }

    fn log(event: &TapEvent) {
        let (name, qtype) = match wire::parse_question(&event.message) {
            Ok(q) => (q.name, q.qtype),
            Err(_) => ("?".to_string(), 0),
        };
        debug!(
            kind = event.kind.as_str(),
            upstream = %event.upstream,
            transport = event.transport.as_str(),
            id = wire::message_id(&event.message).unwrap_or(0),
            name = %name,
            qtype,
            rcode = event.is_response().then(|| wire::rcode(&event.message)),
            rtt_us = event.round_trip_us(),
            bytes = event.message.len(),
            "Upstream exchange"
        );
    }
}
