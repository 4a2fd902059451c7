//! Response cache gateway.
//!
//! Wraps a key-value [`CacheStore`] with read-through semantics. Values are
//! stored as serialized JSON text, so a hit returns exactly the bytes the
//! original miss produced.
//!
//! Two fixed policies exist:
//! - [`CachePolicy::Metadata`]: short TTL for projected Notion records
//! - [`CachePolicy::Immutable`]: no expiry, for content keyed by a stable ID

mod memory;

pub use memory::MemoryCacheStore;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;

/// Versioned key for the collection listing.
pub const COLLECTIONS_KEY: &str = "collections:all:v2";

/// Versioned key for one collection detail.
pub fn collection_key(id: &str) -> String {
    format!("collection:{id}:v2")
}

/// `max-age` advertised for immutable content (one year).
pub const IMMUTABLE_MAX_AGE_SECS: u64 = 31_536_000;

/// Key-addressed store for serialized metadata.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value`; `ttl` of `None` means it never expires.
    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()>;
}

/// Expiry policy for a cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Metadata listings, expire after the given TTL.
    Metadata(Duration),
    /// Content that never changes once written.
    Immutable,
}

impl CachePolicy {
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            Self::Metadata(ttl) => Some(*ttl),
            Self::Immutable => None,
        }
    }

    /// Value for the `Cache-Control` response header.
    pub fn cache_control(&self) -> String {
        match self {
            Self::Metadata(ttl) => format!("public, max-age={}", ttl.as_secs()),
            Self::Immutable => format!("public, max-age={IMMUTABLE_MAX_AGE_SECS}, immutable"),
        }
    }
}

/// Whether a value came from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
        }
    }
}

/// A value annotated with its cache status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cached<T> {
    pub value: T,
    pub status: CacheStatus,
}

/// Read-through gateway over an injected [`CacheStore`].
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Return the cached JSON under `key`, or compute, store and return it.
    ///
    /// Errors from `compute` propagate and nothing is stored. Failures of the
    /// cache store itself are logged and never fail the call.
    pub async fn read_through<T, F, Fut>(
        &self,
        key: &str,
        policy: CachePolicy,
        compute: F,
    ) -> Result<Cached<String>>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.lookup(key).await {
            return Ok(Cached {
                value,
                status: CacheStatus::Hit,
            });
        }

        let value = self.write(key, policy, &compute().await?).await?;
        Ok(Cached {
            value,
            status: CacheStatus::Miss,
        })
    }

    /// Like [`read_through`](Self::read_through), for lookups that may find
    /// nothing upstream. `None` is passed through and never cached.
    pub async fn read_through_optional<T, F, Fut>(
        &self,
        key: &str,
        policy: CachePolicy,
        compute: F,
    ) -> Result<Option<Cached<String>>>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        if let Some(value) = self.lookup(key).await {
            return Ok(Some(Cached {
                value,
                status: CacheStatus::Hit,
            }));
        }

        let Some(computed) = compute().await? else {
            debug!(key, "Nothing to cache");
            return Ok(None);
        };

        let value = self.write(key, policy, &computed).await?;
        Ok(Some(Cached {
            value,
            status: CacheStatus::Miss,
        }))
    }

    async fn lookup(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(Some(value)) => {
                debug!(key, "Cache hit");
                Some(value)
            }
            Ok(None) => {
                debug!(key, "Cache miss");
                None
            }
            Err(e) => {
                warn!(key, error = %e, "Cache read failed, computing");
                None
            }
        }
    }

    async fn write<T: Serialize>(&self, key: &str, policy: CachePolicy, value: &T) -> Result<String> {
        let value = serde_json::to_string(value)?;

        if let Err(e) = self.store.put(key, value.clone(), policy.ttl()).await {
            warn!(key, error = %e, "Cache write failed, serving uncached");
        }

        Ok(value)
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache").finish_non_exhaustive()
    }
}
