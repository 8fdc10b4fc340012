use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::{interval, Instant};
use tracing::{debug, info};

use crate::error::Result;

/// Default expiry window for entries inserted without an explicit TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
    tags: HashSet<String>,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration, tags: Vec<String>) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            ttl,
            tags: tags.into_iter().collect(),
        }
    }

    fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }
}

/// Hit/miss counters for the process lifetime, plus the current entry count.
///
/// `hit_rate` is a percentage; it is `0.0` before the first lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub hit_rate: f64,
}

/// In-memory key-value store with per-entry TTL and tag-based invalidation.
///
/// Values are opaque to the store; handlers decide what goes in under which
/// key. All reads flow through [`Cache::get`], which is also where expired
/// entries are lazily dropped and where hit/miss accounting happens. Every
/// public operation takes the map lock, and none of them suspends while
/// holding it.
pub struct Cache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    max_size: usize,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V> Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_size,
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Insert or overwrite an entry using the store's default TTL.
    pub async fn set(&self, key: &str, value: V, tags: Vec<String>) {
        self.set_with_ttl(key, value, self.default_ttl, tags).await;
    }

    /// Insert or overwrite an entry with an explicit TTL.
    ///
    /// When the store is at capacity and `key` is new, expired entries are
    /// dropped first; if that reclaims nothing, the oldest entries by
    /// creation time are evicted until the new entry fits.
    pub async fn set_with_ttl(&self, key: &str, value: V, ttl: Duration, tags: Vec<String>) {
        let mut entries = self.entries.write().await;

        if entries.len() >= self.max_size && !entries.contains_key(key) {
            let removed = Self::remove_expired(&mut entries);
            if removed > 0 {
                debug!("Cache at capacity, dropped {} expired entries", removed);
            }
            while entries.len() >= self.max_size {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.created_at)
                    .map(|(key, _)| key.clone());
                match oldest {
                    Some(key) => {
                        entries.remove(&key);
                        debug!("Cache at capacity, evicted oldest entry '{}'", key);
                    }
                    None => break,
                }
            }
        }

        entries.insert(key.to_string(), CacheEntry::new(value, ttl, tags));
    }

    /// Single read path: returns the value if present and unexpired.
    ///
    /// An expired entry is removed here and counted as a miss, so callers
    /// never observe stale data.
    pub async fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.hits.fetch_add(1, Ordering::SeqCst);
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.misses.fetch_add(1, Ordering::SeqCst);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::SeqCst);
                None
            }
        }
    }

    /// Returns the cached value, or runs `fetcher` and stores its result.
    ///
    /// The map lock is not held across the fetcher, so concurrent misses on
    /// a cold key each run their own fetch; the last write wins. A fetcher
    /// error propagates unchanged and nothing is cached.
    pub async fn get_or_set<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        tags: Vec<String>,
        fetcher: F,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<V>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let value = fetcher().await?;
        self.set_with_ttl(key, value.clone(), ttl, tags).await;
        Ok(value)
    }

    /// True only if the key is present and unexpired. Delegates to [`get`]
    /// so a stale key reads as absent, and the lookup is counted in the
    /// stats like any other read.
    ///
    /// [`get`]: Cache::get
    pub async fn has(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    /// Remove every entry whose key contains `pattern` as a plain substring.
    pub async fn invalidate_pattern(&self, pattern: &str) -> u64 {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.contains(pattern));
        (before - entries.len()) as u64
    }

    /// Remove every entry tagged with `tag`.
    pub async fn invalidate_by_tag(&self, tag: &str) -> u64 {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.tags.contains(tag));
        (before - entries.len()) as u64
    }

    /// Drop all expired entries, returning how many were removed.
    pub async fn cleanup(&self) -> u64 {
        let mut entries = self.entries.write().await;
        Self::remove_expired(&mut entries)
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn get_stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::SeqCst);
        let misses = self.misses.load(Ordering::SeqCst);
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64 * 100.0
        };

        CacheStats {
            hits,
            misses,
            size: self.entries.read().await.len(),
            hit_rate,
        }
    }

    pub async fn get_keys(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    pub async fn size(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Spawn a background task that sweeps expired entries on an interval.
    ///
    /// The sweep is an optimization only; correctness does not depend on it
    /// because reads drop expired entries lazily. Abort the returned handle
    /// on shutdown.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        info!("🧹 Cache sweeper started (every {:?})", every);
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.tick().await; // first tick completes immediately
            loop {
                ticker.tick().await;
                let removed = self.cleanup().await;
                if removed > 0 {
                    debug!("Cache sweep removed {} expired entries", removed);
                }
            }
        })
    }

    fn remove_expired(entries: &mut HashMap<String, CacheEntry<V>>) -> u64 {
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        (before - entries.len()) as u64
    }
}
