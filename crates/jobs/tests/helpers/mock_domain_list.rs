#![allow(dead_code)]

use async_trait::async_trait;
use bypass_dns_application::ports::{DomainListPort, ReloadOutcome};
use bypass_dns_domain::DomainError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Replays scripted outcomes, then reports `Unchanged`.
pub struct MockDomainList {
    script: Mutex<VecDeque<Result<ReloadOutcome, DomainError>>>,
    calls: AtomicU64,
    domains: AtomicUsize,
}

impl MockDomainList {
    pub fn new(domains: usize) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: AtomicU64::new(0),
            domains: AtomicUsize::new(domains),
        }
    }

    pub fn then(self, outcome: Result<ReloadOutcome, DomainError>) -> Self {
        self.script.lock().unwrap().push_back(outcome);
        self
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DomainListPort for MockDomainList {
    async fn reload_if_changed(&self) -> Result<ReloadOutcome, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        let outcome = next.unwrap_or(Ok(ReloadOutcome::Unchanged));
        if let Ok(ReloadOutcome::Reloaded { domains }) = outcome {
            self.domains.store(domains, Ordering::SeqCst);
        }
        outcome
    }

    fn domain_count(&self) -> usize {
        self.domains.load(Ordering::SeqCst)
    }
}
