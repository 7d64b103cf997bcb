use async_trait::async_trait;
use bypass_dns_domain::DomainError;

/// Result of one change-detection pass over the domain source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Checksum matched the active list; nothing was parsed.
    Unchanged,
    /// A new list was parsed and swapped in.
    Reloaded { domains: usize },
}

/// Port for the active bypass domain list.
#[async_trait]
pub trait DomainListPort: Send + Sync {
    /// Recompute the source checksum and swap in a fresh list when it changed.
    ///
    /// On error the active list and checksum are left untouched.
    async fn reload_if_changed(&self) -> Result<ReloadOutcome, DomainError>;

    fn domain_count(&self) -> usize;
}
