use bypass_dns_application::ports::{DomainListPort, ReloadOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Periodically re-checksums the domain source and swaps in a new list when
/// it changed. The first tick is skipped since the list was loaded at startup.
pub struct DomainListReloadJob {
    list: Arc<dyn DomainListPort>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl DomainListReloadJob {
    pub fn new(list: Arc<dyn DomainListPort>, interval: Duration) -> Self {
        Self {
            list,
            interval,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Runs one reload check.
    pub async fn run_once(&self) -> Option<ReloadOutcome> {
        match self.list.reload_if_changed().await {
            Ok(ReloadOutcome::Reloaded { domains }) => {
                info!(domains, "DomainListReloadJob: domain list reloaded");
                Some(ReloadOutcome::Reloaded { domains })
            }
            Ok(outcome) => {
                debug!("DomainListReloadJob: domain source unchanged");
                Some(outcome)
            }
            Err(e) => {
                error!(
                    error = %e,
                    domains = self.list.domain_count(),
                    "DomainListReloadJob: reload failed, keeping current list"
                );
                None
            }
        }
    }

    pub async fn start(self: Arc<Self>) {
        if self.interval.is_zero() {
            info!("Domain list reload disabled");
            return;
        }
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting domain list reload job"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("DomainListReloadJob: shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.run_once().await;
                }
            }
        }
    }
}
