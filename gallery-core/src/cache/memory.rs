//! In-memory metadata cache with per-entry expiry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::debug;

use super::CacheStore;
use crate::clock::{Clock, SystemClock};
use crate::error::Result;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

/// Metadata cache held in process memory.
///
/// Expiry is checked on read; expired entries are dropped lazily.
pub struct MemoryCacheStore {
    entries: DashMap<String, Entry>,
    clock: Arc<dyn Clock>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Remove every expired entry, returning how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.expires_at.map_or(true, |at| at > now));
        before.saturating_sub(self.entries.len())
    }

    /// Run [`cleanup_expired`](Self::cleanup_expired) every `every` until the
    /// store is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        let every = every.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let removed = store.cleanup_expired();
                if removed > 0 {
                    debug!(removed, remaining = store.len(), "Swept expired cache entries");
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        match self.entries.get(key) {
            None => return Ok(None),
            Some(entry) if entry.expires_at.map_or(true, |at| at > now) => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => {}
        }

        self.entries
            .remove_if(key, |_, entry| entry.expires_at.is_some_and(|at| at <= now));
        Ok(None)
    }

    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.map(|ttl| self.clock.now() + ttl);
        self.entries
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }
}

impl std::fmt::Debug for MemoryCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCacheStore")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[tokio::test]
    async fn test_ttl_boundary() {
        let clock = Arc::new(ManualClock::new());
        let cache = MemoryCacheStore::with_clock(clock.clone());
        let ttl = Duration::from_secs(300);

        cache.put("k", "v".into(), Some(ttl)).await.unwrap();

        clock.advance(ttl - Duration::from_millis(1));
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        clock.advance(Duration::from_millis(2));
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty(), "expired entry should be evicted on read");
    }

    #[tokio::test]
    async fn test_no_ttl_never_expires() {
        let clock = Arc::new(ManualClock::new());
        let cache = MemoryCacheStore::with_clock(clock.clone());

        cache.put("k", "v".into(), None).await.unwrap();
        clock.advance(Duration::from_secs(10 * 365 * 24 * 3600));

        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_put_replaces_entry() {
        let cache = MemoryCacheStore::new();
        cache.put("k", "old".into(), None).await.unwrap();
        cache.put("k", "new".into(), None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let clock = Arc::new(ManualClock::new());
        let cache = MemoryCacheStore::with_clock(clock.clone());

        cache
            .put("short", "a".into(), Some(Duration::from_secs(1)))
            .await
            .unwrap();
        cache.put("forever", "b".into(), None).await.unwrap();

        clock.advance(Duration::from_secs(2));
        cache.cleanup_expired();

        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_periodically_and_stops_with_store() {
        let clock = Arc::new(ManualClock::new());
        let cache = Arc::new(MemoryCacheStore::with_clock(clock.clone()));
        cache
            .put("short", "a".into(), Some(Duration::from_secs(1)))
            .await
            .unwrap();
        cache.put("forever", "b".into(), None).await.unwrap();

        let sweeper = cache.spawn_sweeper(Duration::from_secs(60));
        clock.advance(Duration::from_secs(2));

        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(cache.len(), 1);

        drop(cache);
        let finished = tokio::time::timeout(Duration::from_secs(300), sweeper).await;
        assert!(finished.is_ok(), "sweeper should exit once the store is gone");
    }
}
