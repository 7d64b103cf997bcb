//! Per-endpoint health probing.
//!
//! The task sleeps until [`Endpoint::healthcheck`] wakes it, then probes
//! every interval until one probe succeeds. Between wake-ups it sweeps
//! expired idle connections.

use super::endpoint::Endpoint;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const SWEEP_WITHOUT_INTERVAL: Duration = Duration::from_secs(1);

pub(super) struct HealthTask {
    pub(super) token: CancellationToken,
    pub(super) handle: JoinHandle<()>,
}

impl HealthTask {
    pub(super) async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Health task ended abnormally");
        }
    }
}

pub(super) async fn run_health_loop(
    endpoint: Arc<Endpoint>,
    interval: Duration,
    token: CancellationToken,
) {
    let server = endpoint.addr();
    debug!(server = %server, interval_ms = interval.as_millis() as u64, "Health checker running");

    let sweep_every = if interval.is_zero() {
        SWEEP_WITHOUT_INTERVAL
    } else {
        interval
    };
    let mut sweep = tokio::time::interval(sweep_every);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = sweep.tick() => {
                endpoint.sweep_idle();
                continue;
            }
            _ = endpoint.wake.notified() => {}
        }
        if !probe_until_healthy(&endpoint, interval, &token).await {
            break;
        }
    }

    debug!(server = %server, "Health checker stopped");
}

/// Returns `false` when cancelled.
async fn probe_until_healthy(
    endpoint: &Endpoint,
    interval: Duration,
    token: &CancellationToken,
) -> bool {
    let server = endpoint.addr();
    loop {
        let result = tokio::select! {
            _ = token.cancelled() => return false,
            r = endpoint.probe() => r,
        };

        match result {
            Ok(()) => {
                let previous = endpoint.reset_failures();
                if previous > 0 {
                    info!(server = %server, previous_fails = previous, "Server marked HEALTHY");
                } else {
                    debug!(server = %server, "Health check: OK");
                }
                return true;
            }
            Err(e) => {
                endpoint.metrics.record_healthcheck_failure(server);
                warn!(server = %server, error = %e, "Health check: FAILED");
            }
        }

        if interval.is_zero() {
            return true;
        }
        tokio::select! {
            _ = token.cancelled() => return false,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
