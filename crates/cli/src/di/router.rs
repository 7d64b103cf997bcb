use bypass_dns_application::ports::{DomainListPort, NoopQueryTap, QueryTapPort};
use bypass_dns_domain::Config;
use bypass_dns_infrastructure::dns::{
    ChannelQueryTap, ChecksumReloader, DomainSource, InMemoryRouterMetrics, Router,
    TapEventLogger,
};
use bypass_dns_jobs::{DomainListReloadJob, JobRunner};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct RouterServices {
    pub router: Arc<Router>,
    pub reloader: Option<Arc<ChecksumReloader>>,
    pub metrics: InMemoryRouterMetrics,
    tap_logger: Option<TapLoggerTask>,
}

struct TapLoggerTask {
    shutdown: CancellationToken,
    handle: JoinHandle<u64>,
}

impl RouterServices {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        info!("Initializing query router");

        let reloader = Self::load_domain_list(config).await?;
        let (tap, tap_logger) = Self::setup_tap(config);
        let metrics = InMemoryRouterMetrics::new();

        let mut builder = Router::builder(&config.router)
            .with_tap(tap)
            .with_metrics(Arc::new(metrics.clone()));
        if let Some(reloader) = &reloader {
            builder = builder.with_domains(reloader.active());
        }
        let router = Arc::new(builder.build()?);
        router.start();

        info!(
            zone = %router.zone(),
            pass = router.pass_len(),
            forward = router.forward_len(),
            policy = %router.policy(),
            domains = router.active_domain_count(),
            force_tcp = router.force_tcp(),
            prefer_udp = router.prefer_udp(),
            "Query router ready"
        );

        Ok(Self {
            router,
            reloader,
            metrics,
            tap_logger,
        })
    }

    async fn load_domain_list(config: &Config) -> anyhow::Result<Option<Arc<ChecksumReloader>>> {
        let Some(source_config) = &config.router.domain_source else {
            info!("No domain source configured, only the zone apex uses the pass pool");
            return Ok(None);
        };
        let source = DomainSource::from_config(source_config)?;
        let reloader = ChecksumReloader::load(source).await?;
        info!(
            domains = reloader.domain_count(),
            checksum = %reloader.checksum(),
            "Bypass domain list loaded"
        );
        Ok(Some(Arc::new(reloader)))
    }

    fn setup_tap(config: &Config) -> (Arc<dyn QueryTapPort>, Option<TapLoggerTask>) {
        if !config.logging.tap {
            return (Arc::new(NoopQueryTap), None);
        }
        let (tap, rx) = ChannelQueryTap::new_enabled();
        let shutdown = CancellationToken::new();
        let handle = TapEventLogger::new().start(rx, shutdown.clone());
        info!("Upstream exchange tap enabled");
        (Arc::new(tap), Some(TapLoggerTask { shutdown, handle }))
    }

    pub fn job_runner(&self, config: &Config, shutdown: CancellationToken) -> JobRunner {
        let runner = JobRunner::new().with_shutdown_token(shutdown);
        match &self.reloader {
            Some(reloader) => {
                let list: Arc<dyn DomainListPort> = reloader.clone();
                runner.with_domain_list_reload(DomainListReloadJob::new(
                    list,
                    config.router.reload_interval(),
                ))
            }
            None => runner,
        }
    }

    pub async fn shutdown(self) {
        self.router.close().await;
        info!(
            requests = self.metrics.requests_total(),
            responses = self.metrics.responses_total(),
            healthcheck_broken = self.metrics.healthcheck_broken(),
            max_concurrent_rejects = self.metrics.max_concurrent_rejects(),
            "Query router stopped"
        );
        if let Some(task) = self.tap_logger {
            task.shutdown.cancel();
            match task.handle.await {
                Ok(events) => info!(events, "Upstream exchange tap stopped"),
                Err(e) => warn!(error = %e, "Tap logger ended abnormally"),
            }
        }
    }
}
