use bypass_dns_domain::config::MAX_UPSTREAMS;
use bypass_dns_domain::PolicyKind;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Ordered view over a pool, one per query.
pub type Ordered<'a, T> = SmallVec<[&'a T; MAX_UPSTREAMS]>;

/// Orders a pool's endpoints for one query.
#[derive(Debug)]
pub enum SelectionPolicy {
    /// One random member first, the rest in configured order.
    Random,
    /// Starting index advances by one per call across all callers.
    RoundRobin { cursor: AtomicUsize },
    /// Always configured order.
    Sequential,
}

impl SelectionPolicy {
    pub fn new(kind: PolicyKind) -> Self {
        match kind {
            PolicyKind::Random => Self::Random,
            PolicyKind::RoundRobin => Self::RoundRobin {
                cursor: AtomicUsize::new(0),
            },
            PolicyKind::Sequential => Self::Sequential,
        }
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::Random => PolicyKind::Random,
            Self::RoundRobin { .. } => PolicyKind::RoundRobin,
            Self::Sequential => PolicyKind::Sequential,
        }
    }

    /// Same members as `items`, in the order they should be tried.
    pub fn list<'a, T>(&self, items: &'a [T]) -> Ordered<'a, T> {
        let len = items.len();
        if len <= 1 {
            return items.iter().collect();
        }
        match self {
            Self::Random => random_first(items, fastrand::usize(..len)),
            Self::RoundRobin { cursor } => {
                let start = cursor.fetch_add(1, Ordering::Relaxed) % len;
                items[start..].iter().chain(&items[..start]).collect()
            }
            Self::Sequential => items.iter().collect(),
        }
    }
}

fn random_first<T>(items: &[T], pick: usize) -> Ordered<'_, T> {
    let mut out = Ordered::with_capacity(items.len());
    out.push(&items[pick]);
    out.extend(
        items
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != pick)
            .map(|(_, item)| item),
    );
    out
}
