use crate::DomainListReloadJob;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub trait SpawnableJob: Send + Sync + 'static {
    fn with_cancellation(self, token: CancellationToken) -> Self;
    fn start_job(self: Arc<Self>) -> JoinHandle<()>;
}

macro_rules! impl_spawnable_job {
    ($t:ty) => {
        impl SpawnableJob for $t {
            fn with_cancellation(self, token: CancellationToken) -> Self {
                self.with_cancellation(token)
            }

            fn start_job(self: Arc<Self>) -> JoinHandle<()> {
                tokio::spawn(async move { self.start().await })
            }
        }
    };
}

impl_spawnable_job!(DomainListReloadJob);

fn spawn_job<J: SpawnableJob>(job: Option<J>, token: &CancellationToken) -> Option<JoinHandle<()>> {
    job.map(|job| Arc::new(job.with_cancellation(token.clone())).start_job())
}

/// Handles of the jobs started by a [`JobRunner`].
pub struct JobHandles {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl JobHandles {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Cancels every job and waits for it to return.
    pub async fn shutdown(self) {
        self.token.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background job ended abnormally");
            }
        }
        info!("Background jobs stopped");
    }
}

pub struct JobRunner {
    domain_list_reload: Option<DomainListReloadJob>,
    shutdown: CancellationToken,
}

impl JobRunner {
    pub fn new() -> Self {
        Self {
            domain_list_reload: None,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_domain_list_reload(mut self, job: DomainListReloadJob) -> Self {
        self.domain_list_reload = Some(job);
        self
    }

    /// Jobs are cancelled when `token` is, as well as by [`JobHandles::shutdown`].
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub async fn start(self) -> JobHandles {
        info!("Starting background job runner");

        let token = self.shutdown.child_token();
        let handles: Vec<_> = [spawn_job(self.domain_list_reload, &token)]
            .into_iter()
            .flatten()
            .collect();

        info!(jobs = handles.len(), "All background jobs started");
        JobHandles { token, handles }
    }
}

impl Default for JobRunner {
    fn default() -> Self {
        Self::new()
    }
}
