//! At-most-once image download and persistence.
//!
//! [`ImageCache::ensure_cached`] turns a transient source URL into a stable
//! public URL served by this system. It never fails: when the origin or the
//! store misbehaves, the original URL is handed back so the caller can still
//! render something.
//!
//! There is no cross-request locking. Two concurrent calls for a new stable
//! ID can both download and both write; writes are idempotent, so the only
//! cost is the duplicate download.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::origin::ImageOrigin;
use crate::stable_id;
use crate::store::{image_key, ObjectStore, StoredObject, DEFAULT_CONTENT_TYPE};

/// One image attached to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Transient signed URL or external static URL.
    pub source_url: String,
    /// Identifier that survives signature rotation.
    pub stable_id: String,
}

impl ImageReference {
    /// Build a reference, deriving the stable ID from `hint` or the URL.
    pub fn new(source_url: impl Into<String>, hint: Option<&str>) -> Self {
        let source_url = source_url.into();
        let stable_id = stable_id::derive(&source_url, hint);
        Self {
            source_url,
            stable_id,
        }
    }
}

/// Durable image cache over an injected store and origin.
#[derive(Clone)]
pub struct ImageCache {
    store: Arc<dyn ObjectStore>,
    origin: Arc<dyn ImageOrigin>,
    public_base_url: String,
}

impl ImageCache {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        origin: Arc<dyn ImageOrigin>,
        public_base_url: impl Into<String>,
    ) -> Self {
        let public_base_url = public_base_url.into().trim_end_matches('/').to_string();
        Self {
            store,
            origin,
            public_base_url,
        }
    }

    /// Public URL under which the image with `stable_id` is served.
    pub fn public_url(&self, stable_id: &str) -> String {
        format!("{}/{}", self.public_base_url, image_key(stable_id))
    }

    /// Ensure the image is stored and return its public URL.
    ///
    /// Returns `source_url` unchanged if fetching or storing fails.
    #[instrument(level = "debug", skip_all, fields(stable_id = %stable_id))]
    pub async fn ensure_cached(&self, source_url: &str, stable_id: &str) -> String {
        if source_url.is_empty() {
            return String::new();
        }

        let key = image_key(stable_id);
        match self.store.head(&key).await {
            Ok(Some(_)) => {
                debug!("Image already cached");
                return self.public_url(stable_id);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Existence check failed, fetching anyway"),
        }

        match self.fetch_and_store(source_url, &key).await {
            Ok(bytes) => {
                info!(key = %key, bytes, "Image cached");
                self.public_url(stable_id)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Image caching failed, falling back to source URL");
                source_url.to_string()
            }
        }
    }

    async fn fetch_and_store(&self, source_url: &str, key: &str) -> Result<usize> {
        let fetched = self.origin.fetch(source_url).await?;
        let content_type = fetched
            .content_type
            .filter(|ct| !ct.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let len = fetched.body.len();

        self.store.put(key, fetched.body, &content_type).await?;
        Ok(len)
    }

    /// Cache every reference concurrently and return their URLs in order.
    ///
    /// Waits at most `deadline`. Tasks still running then are left to finish
    /// in the background and their slots fall back to the source URL.
    pub async fn cache_all(&self, refs: &[ImageReference], deadline: Duration) -> Vec<String> {
        let handles: Vec<_> = refs
            .iter()
            .map(|r| {
                let cache = self.clone();
                let r = r.clone();
                tokio::spawn(async move { cache.ensure_cached(&r.source_url, &r.stable_id).await })
            })
            .collect();

        let until = tokio::time::Instant::now() + deadline;
        let mut urls = Vec::with_capacity(refs.len());
        for (handle, r) in handles.into_iter().zip(refs) {
            let url = match tokio::time::timeout_at(until, handle).await {
                Ok(Ok(url)) => url,
                Ok(Err(e)) => {
                    warn!(stable_id = %r.stable_id, error = %e, "Image task panicked");
                    r.source_url.clone()
                }
                Err(_) => {
                    debug!(stable_id = %r.stable_id, "Image task still running, continuing in background");
                    r.source_url.clone()
                }
            };
            urls.push(url);
        }
        urls
    }

    /// Read a cached image.
    pub async fn load(&self, stable_id: &str) -> Result<Option<StoredObject>> {
        self.store.get(&image_key(stable_id)).await
    }
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache")
            .field("public_base_url", &self.public_base_url)
            .finish_non_exhaustive()
    }
}
