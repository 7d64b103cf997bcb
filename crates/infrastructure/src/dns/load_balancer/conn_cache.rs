//! Per-endpoint idle connection cache.
//!
//! One LIFO stack per wire transport. A connection is owned by exactly one
//! exchange while checked out, and only goes back after a complete reply.

use crate::dns::transport::Connection;
use bypass_dns_domain::Transport;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const MAX_IDLE_PER_TRANSPORT: usize = 16;

/// A connection that keeps the endpoint's open-socket count accurate until dropped.
pub struct TrackedConnection {
    conn: Connection,
    open: Arc<AtomicUsize>,
}

impl TrackedConnection {
    pub fn new(conn: Connection, open: Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::Relaxed);
        Self { conn, open }
    }

    pub fn transport(&self) -> Transport {
        self.conn.transport()
    }

    pub fn get_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

impl Drop for TrackedConnection {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::Relaxed);
    }
}

struct IdleConnection {
    conn: TrackedConnection,
    last_used: Instant,
}

pub struct ConnectionCache {
    idle: DashMap<Transport, Vec<IdleConnection>>,
    expire: Duration,
    closed: AtomicBool,
}

impl ConnectionCache {
    pub fn new(expire: Duration) -> Self {
        Self {
            idle: DashMap::new(),
            expire,
            closed: AtomicBool::new(false),
        }
    }

    /// Most recently returned live connection, if any. Expired ones are dropped.
    pub fn checkout(&self, transport: Transport) -> Option<TrackedConnection> {
        let mut stack = self.idle.get_mut(&transport)?;
        let idle = stack.pop()?;
        if idle.last_used.elapsed() < self.expire {
            return Some(idle.conn);
        }
        // everything below the top is older still
        stack.clear();
        None
    }

    /// Dropped instead of cached when expiry is zero or the cache is closed.
    pub fn give_back(&self, conn: TrackedConnection) {
        if self.expire.is_zero() || self.closed.load(Ordering::Acquire) {
            return;
        }
        let mut stack = self.idle.entry(conn.transport()).or_default();
        if stack.len() < MAX_IDLE_PER_TRANSPORT {
            stack.push(IdleConnection {
                conn,
                last_used: Instant::now(),
            });
        }
    }

    /// Drops idle connections older than the expiry.
    pub fn sweep(&self) {
        let expire = self.expire;
        for mut stack in self.idle.iter_mut() {
            stack.retain(|idle| idle.last_used.elapsed() < expire);
        }
    }

    /// Drops every idle connection and refuses returns until [`reopen`](Self::reopen).
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.idle.clear();
    }

    pub fn reopen(&self) {
        self.closed.store(false, Ordering::Release);
    }

    pub fn idle_count(&self) -> usize {
        self.idle.iter().map(|s| s.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::transport::UdpConnection;

    async fn udp(open: &Arc<AtomicUsize>) -> TrackedConnection {
        let conn = UdpConnection::connect("127.0.0.1:53".parse().unwrap())
            .await
            .unwrap();
        TrackedConnection::new(Connection::Udp(conn), Arc::clone(open))
    }

    #[tokio::test]
    async fn checkout_is_lifo_and_exclusive() {
        let open = Arc::new(AtomicUsize::new(0));
        let cache = ConnectionCache::new(Duration::from_secs(10));
        cache.give_back(udp(&open).await);
        cache.give_back(udp(&open).await);
        assert_eq!(cache.idle_count(), 2);
        assert_eq!(open.load(Ordering::Relaxed), 2);

        let a = cache.checkout(Transport::Udp).unwrap();
        let b = cache.checkout(Transport::Udp).unwrap();
        assert!(cache.checkout(Transport::Udp).is_none());
        assert!(cache.checkout(Transport::Tcp).is_none());
        drop((a, b));
        assert_eq!(open.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn expired_connections_are_dropped() {
        let open = Arc::new(AtomicUsize::new(0));
        let cache = ConnectionCache::new(Duration::from_millis(20));
        cache.give_back(udp(&open).await);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.checkout(Transport::Udp).is_none());
        assert_eq!(open.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn sweep_removes_stale_entries() {
        let open = Arc::new(AtomicUsize::new(0));
        let cache = ConnectionCache::new(Duration::from_millis(20));
        cache.give_back(udp(&open).await);
        tokio::time::sleep(Duration::from_millis(40)).await;
        cache.sweep();
        assert_eq!(cache.idle_count(), 0);
        assert_eq!(open.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn returns_after_close_are_dropped() {
        let open = Arc::new(AtomicUsize::new(0));
        let cache = ConnectionCache::new(Duration::from_secs(10));
        cache.give_back(udp(&open).await);
        let in_flight = udp(&open).await;

        cache.close();
        assert_eq!(cache.idle_count(), 0);
        cache.give_back(in_flight);
        assert_eq!(cache.idle_count(), 0);
        assert_eq!(open.load(Ordering::Relaxed), 0);

        cache.reopen();
        cache.give_back(udp(&open).await);
        assert_eq!(cache.idle_count(), 1);
    }

    #[tokio::test]
    async fn zero_expiry_disables_caching() {
        let open = Arc::new(AtomicUsize::new(0));
        let cache = ConnectionCache::new(Duration::ZERO);
        cache.give_back(udp(&open).await);
        assert_eq!(cache.idle_count(), 0);
        assert_eq!(open.load(Ordering::Relaxed), 0);
    }
}
