//! Durable object store for cached image bytes.
//!
//! Objects are written once under a key derived from a stable identifier and
//! never mutated afterwards. Two backends are provided:
//! - **Memory**: a concurrent map, used in tests and when no directory is configured.
//! - **Filesystem**: one file per object plus a JSON sidecar for its content type.

mod fs;
mod memory;

pub use fs::FsObjectStore;
pub use memory::MemoryObjectStore;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Content type recorded when the origin does not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// Metadata returned by [`ObjectStore::head`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub content_type: String,
    pub size: u64,
}

/// A stored object with its body.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
}

/// Key-addressed blob store.
///
/// Implementations must be thread-safe (`Send + Sync`); `put` on an existing
/// key overwrites it.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Existence check without transferring the body.
    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>>;

    /// Fetch an object, `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<StoredObject>>;

    /// Write an object.
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()>;
}

/// Object key for an image with the given stable identifier.
pub fn image_key(stable_id: &str) -> String {
    format!("images/{stable_id}.jpg")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_key_layout() {
        assert_eq!(image_key("abc"), "images/abc.jpg");
    }
}
