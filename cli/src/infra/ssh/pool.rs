//! Keyed, reusable bastion connections with LRU eviction and an idle sweep.
//!
//! One cached connection per `(host, key_name)`. A single exclusive lock
//! guards the map and its recency metadata; liveness is checked
//! structurally before reuse and dead entries are redialed transparently.
//! The pool is explicitly constructed and explicitly drained — there is no
//! process-wide singleton.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::domain::UnitError;
use crate::retry::{MAX_ATTEMPTS, RETRY_DELAY, retry_fixed};

/// Cached connections the pool will hold at most.
pub const DEFAULT_CAPACITY: usize = 16;

/// Idle age past which the sweep closes an entry.
pub const DEFAULT_IDLE_AFTER: Duration = Duration::from_secs(300);

/// How often the background sweep runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Pool key: one cached connection per bastion host and key identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub host: String,
    pub key_name: String,
}

/// Minimal view of a pooled connection: cheap handle cloning, structural
/// liveness, and close.
pub trait PooledTransport: Clone + Send + Sync + 'static {
    fn is_open(&self) -> bool;
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Dials new connections on a pool miss.
pub trait Dialer: Send + Sync + 'static {
    type Conn: PooledTransport;
    fn dial(&self, key: &PoolKey) -> impl Future<Output = Result<Self::Conn, UnitError>> + Send;
}

struct Entry<C> {
    conn: C,
    last_used: Instant,
}

pub struct ConnectionPool<D: Dialer> {
    dialer: D,
    capacity: usize,
    idle_after: Duration,
    entries: Mutex<HashMap<PoolKey, Entry<D::Conn>>>,
}

impl<D: Dialer> ConnectionPool<D> {
    #[must_use]
    pub fn new(dialer: D, capacity: usize, idle_after: Duration) -> Self {
        Self {
            dialer,
            capacity: capacity.max(1),
            idle_after,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return a cached live connection for `key`, dialing a fresh one
    /// (bounded retry, fixed delay) on miss. At capacity, the
    /// least-recently-used entry is closed before inserting.
    ///
    /// # Errors
    ///
    /// Returns the dial error once all attempts are exhausted; the pool
    /// itself never retries further.
    pub async fn acquire(&self, key: &PoolKey) -> Result<D::Conn, UnitError> {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(key) {
            if entry.conn.is_open() {
                entry.last_used = Instant::now();
                return Ok(entry.conn.clone());
            }
            tracing::debug!(host = %key.host, "cached connection is dead; evicting");
            if let Some(dead) = entries.remove(key) {
                dead.conn.close().await;
            }
        }

        let conn = retry_fixed(MAX_ATTEMPTS, RETRY_DELAY, || self.dialer.dial(key))
            .await
            .map_err(|err| match err {
                UnitError::Dial { host, reason, .. } => {
                    UnitError::Dial { host, attempts: MAX_ATTEMPTS, reason }
                }
                other => other,
            })?;

        if entries.len() >= self.capacity {
            evict_lru(&mut entries).await;
        }
        entries.insert(key.clone(), Entry { conn: conn.clone(), last_used: Instant::now() });
        Ok(conn)
    }

    /// Close and remove entries idle longer than the configured threshold.
    /// Returns how many were evicted.
    pub async fn sweep_idle(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let Some(cutoff) = Instant::now().checked_sub(self.idle_after) else {
            return 0;
        };
        let stale: Vec<PoolKey> = entries
            .iter()
            .filter(|(_, entry)| entry.last_used <= cutoff)
            .map(|(key, _)| key.clone())
            .collect();
        let evicted = stale.len();
        for key in stale {
            if let Some(entry) = entries.remove(&key) {
                tracing::debug!(host = %key.host, "closing idle pooled connection");
                entry.conn.close().await;
            }
        }
        evicted
    }

    /// Number of cached entries.
    pub async fn size(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Close every cached connection. The explicit drain at the end of a
    /// run; the pool stays usable afterwards.
    pub async fn shutdown(&self) {
        let mut entries = self.entries.lock().await;
        for (key, entry) in entries.drain() {
            tracing::debug!(host = %key.host, "closing pooled connection");
            entry.conn.close().await;
        }
    }

    /// Spawn the background idle sweep. Abort the returned handle to stop it.
    pub fn spawn_sweeper(pool: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await; // the first tick fires immediately
            loop {
                ticker.tick().await;
                let evicted = pool.sweep_idle().await;
                if evicted > 0 {
                    tracing::debug!(evicted, "idle sweep closed connections");
                }
            }
        })
    }
}

async fn evict_lru<C: PooledTransport>(entries: &mut HashMap<PoolKey, Entry<C>>) {
    let Some(key) =
        entries.iter().min_by_key(|(_, entry)| entry.last_used).map(|(key, _)| key.clone())
    else {
        return;
    };
    if let Some(entry) = entries.remove(&key) {
        tracing::debug!(host = %key.host, "pool at capacity; evicting least recently used");
        entry.conn.close().await;
    }
}
