use bypass_dns_domain::DomainError;
use std::sync::atomic::{AtomicU64, Ordering};

/// In-flight query ceiling. `limit == 0` admits everything without touching the counter.
#[derive(Debug)]
pub struct Admission {
    limit: u64,
    in_flight: AtomicU64,
}

/// Holds one admission slot until dropped.
#[derive(Debug)]
pub struct AdmissionGuard<'a> {
    in_flight: &'a AtomicU64,
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Admission {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            in_flight: AtomicU64::new(0),
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Acquire)
    }

    /// The slot is taken before the limit check, so a rejected caller also
    /// releases it when the guard drops.
    pub fn try_admit(&self) -> Result<Option<AdmissionGuard<'_>>, DomainError> {
        if self.limit == 0 {
            return Ok(None);
        }
        let count = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        let guard = AdmissionGuard {
            in_flight: &self.in_flight,
        };
        if count > self.limit {
            drop(guard);
            return Err(DomainError::ConcurrencyLimitExceeded { limit: self.limit });
        }
        Ok(Some(guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_admits_without_counting() {
        let admission = Admission::new(0);
        let guard = admission.try_admit().unwrap();
        assert!(guard.is_none());
        assert_eq!(admission.in_flight(), 0);
    }

    #[test]
    fn rejects_over_limit_and_releases() {
        let admission = Admission::new(1);
        let first = admission.try_admit().unwrap();
        assert_eq!(admission.in_flight(), 1);

        let err = admission.try_admit().unwrap_err();
        assert_eq!(err, DomainError::ConcurrencyLimitExceeded { limit: 1 });
        assert_eq!(admission.in_flight(), 1);

        drop(first);
        assert_eq!(admission.in_flight(), 0);
        assert!(admission.try_admit().unwrap().is_some());
    }
}
