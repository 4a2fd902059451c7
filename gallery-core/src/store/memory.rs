//! In-memory object store.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use super::{ObjectMeta, ObjectStore, StoredObject};
use crate::error::Result;

/// Object store backed by a concurrent map. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, StoredObject>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>> {
        Ok(self.objects.get(key).map(|entry| ObjectMeta {
            content_type: entry.content_type.clone(),
            size: entry.body.len() as u64,
        }))
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>> {
        Ok(self.objects.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        self.objects.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}

impl std::fmt::Debug for MemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryObjectStore")
            .field("objects", &self.objects.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_head_and_get() {
        let store = MemoryObjectStore::new();
        assert!(store.head("images/a.jpg").await.unwrap().is_none());

        store
            .put("images/a.jpg", Bytes::from_static(b"jpeg"), "image/png")
            .await
            .unwrap();

        let meta = store.head("images/a.jpg").await.unwrap().unwrap();
        assert_eq!(meta.content_type, "image/png");
        assert_eq!(meta.size, 4);

        let object = store.get("images/a.jpg").await.unwrap().unwrap();
        assert_eq!(object.body.as_ref(), b"jpeg");
        assert_eq!(store.len(), 1);
    }
}
