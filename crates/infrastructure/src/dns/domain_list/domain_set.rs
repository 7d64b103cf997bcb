//! Length-bucketed membership set over dot-terminated names.
//!
//! Names are stored as fixed-width, zero-padded byte arrays in one of three
//! buckets so a lookup hashes a stack buffer instead of a heap string.
//! A name cannot contain a NUL byte, so padding never makes two distinct
//! names collide.

use bypass_dns_domain::fqdn::{self, MAX_DOMAIN_LEN};
use bypass_dns_domain::DomainError;
use rustc_hash::FxBuildHasher;
use std::collections::HashSet;

const SHORT: usize = 16;
const MEDIUM: usize = 32;

type Bucket<const N: usize> = HashSet<[u8; N], FxBuildHasher>;

#[derive(Clone, Default)]
pub struct DomainSet {
    short: Bucket<SHORT>,
    medium: Bucket<MEDIUM>,
    long: Bucket<MAX_DOMAIN_LEN>,
}

#[inline]
fn padded<const N: usize>(name: &[u8]) -> [u8; N] {
    let mut key = [0u8; N];
    for (dst, src) in key.iter_mut().zip(name) {
        *dst = src.to_ascii_lowercase();
    }
    key
}

impl DomainSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `name` after normalizing it. Returns `false` when it was already present.
    pub fn insert(&mut self, name: &str) -> Result<bool, DomainError> {
        let name = fqdn::normalize(name)?;
        if name == "." {
            return Err(DomainError::InvalidDomainName(
                "the root name cannot be added".to_string(),
            ));
        }
        let bytes = name.as_bytes();
        Ok(match bytes.len() {
            n if n <= SHORT => self.short.insert(padded(bytes)),
            n if n <= MEDIUM => self.medium.insert(padded(bytes)),
            _ => self.long.insert(padded(bytes)),
        })
    }

    /// True when `name` or one of its parent names (excluding the root) was inserted.
    ///
    /// The walk starts at the full name and moves outward one label at a time.
    pub fn contains(&self, name: &str) -> bool {
        if name.is_empty() || name == "." {
            return false;
        }
        if !name.ends_with('.') {
            return self.contains(&fqdn::fqdn(name));
        }
        let bytes = name.as_bytes();
        fqdn::label_offsets(name).any(|offset| self.contains_exact(&bytes[offset..]))
    }

    #[inline]
    fn contains_exact(&self, name: &[u8]) -> bool {
        match name.len() {
            0 => false,
            n if n <= SHORT => self.short.contains(&padded::<SHORT>(name)),
            n if n <= MEDIUM => self.medium.contains(&padded::<MEDIUM>(name)),
            n if n <= MAX_DOMAIN_LEN => self.long.contains(&padded::<MAX_DOMAIN_LEN>(name)),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.short.len() + self.medium.len() + self.long.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for DomainSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainSet")
            .field("short", &self.short.len())
            .field("medium", &self.medium.len())
            .field("long", &self.long.len())
            .finish()
    }
}
