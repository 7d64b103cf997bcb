use super::checksum::Checksum;
use super::domain_set::DomainSet;
use super::source::{DomainSource, LoadedList};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use bypass_dns_application::ports::{DomainListPort, ReloadOutcome};
use bypass_dns_domain::DomainError;
use std::sync::Arc;
use tracing::{debug, info};

/// The list queries read from; swapped whole on reload.
pub type SharedDomainList = Arc<ArcSwap<LoadedList>>;

pub fn shared_list(list: LoadedList) -> SharedDomainList {
    Arc::new(ArcSwap::from_pointee(list))
}

pub fn empty_shared_list() -> SharedDomainList {
    shared_list(LoadedList {
        set: DomainSet::new(),
        checksum: Checksum::default(),
    })
}

/// Swaps in a freshly parsed list when the source checksum changes.
///
/// Readers go through the shared [`ArcSwap`] and never block; a failed
/// reload leaves both the active set and its checksum in place.
pub struct ChecksumReloader {
    source: DomainSource,
    active: SharedDomainList,
}

impl ChecksumReloader {
    /// Performs the initial load; failure here is a configuration error.
    pub async fn load(source: DomainSource) -> Result<Self, DomainError> {
        let list = source.load().await.map_err(|e| {
            DomainError::ConfigError(format!(
                "cannot load domain source {}: {}",
                source.locator(),
                e
            ))
        })?;
        Ok(Self::with_active(source, shared_list(list)))
    }

    pub fn with_active(source: DomainSource, active: SharedDomainList) -> Self {
        Self { source, active }
    }

    pub fn active(&self) -> SharedDomainList {
        Arc::clone(&self.active)
    }

    pub fn checksum(&self) -> Checksum {
        self.active.load().checksum
    }
}

#[async_trait]
impl DomainListPort for ChecksumReloader {
    async fn reload_if_changed(&self) -> Result<ReloadOutcome, DomainError> {
        let (fresh, body) = self.source.current_checksum().await?;
        let stored = self.checksum();
        if fresh == stored {
            debug!(checksum = %stored, "Domain source unchanged");
            return Ok(ReloadOutcome::Unchanged);
        }

        let loaded = self.source.load_with(body).await?;
        let domains = loaded.set.len();
        info!(
            old_checksum = %stored,
            new_checksum = %loaded.checksum,
            domains,
            "Domain list replaced"
        );
        self.active.store(Arc::new(loaded));
        Ok(ReloadOutcome::Reloaded { domains })
    }

    fn domain_count(&self) -> usize {
        self.active.load().set.len()
    }
}
