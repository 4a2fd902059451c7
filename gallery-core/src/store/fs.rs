//! Filesystem object store.
//!
//! Layout under the root directory:
//! - `{key}`: the object body
//! - `{key}.meta.json`: `{"content_type": "..."}`
//!
//! Bodies and sidecars are written to a temporary file and renamed into
//! place, so a reader never observes a partially written file.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::fs;

use super::{ObjectMeta, ObjectStore, StoredObject, DEFAULT_CONTENT_TYPE};
use crate::error::{GalleryError, Result};

#[derive(Serialize, Deserialize)]
struct Sidecar {
    content_type: String,
}

/// Object store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            GalleryError::Store(format!("Failed to create {}: {e}", root.display()))
        })?;
        tracing::info!(root = %root.display(), "Using filesystem object store");
        Ok(Self { root })
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !safe {
            return Err(GalleryError::Store(format!("Invalid object key: {key}")));
        }
        Ok(self.root.join(relative))
    }

    fn sidecar_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".meta.json");
        PathBuf::from(name)
    }

    /// Write `contents` next to `path` and rename it over `path`.
    async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, contents).await?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(())
    }

    async fn read_content_type(path: &Path) -> Result<String> {
        match fs::read(Self::sidecar_path(path)).await {
            Ok(raw) => Ok(serde_json::from_slice::<Sidecar>(&raw)?.content_type),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(DEFAULT_CONTENT_TYPE.to_string()),
            Err(e) => Err(GalleryError::Store(format!("Failed to read metadata: {e}"))),
        }
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn head(&self, key: &str) -> Result<Option<ObjectMeta>> {
        let path = self.object_path(key)?;
        let metadata = match fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(GalleryError::Store(format!("Failed to stat {key}: {e}"))),
        };

        Ok(Some(ObjectMeta {
            content_type: Self::read_content_type(&path).await?,
            size: metadata.len(),
        }))
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>> {
        let path = self.object_path(key)?;
        let body = match fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(GalleryError::Store(format!("Failed to read {key}: {e}"))),
        };

        Ok(Some(StoredObject {
            body: Bytes::from(body),
            content_type: Self::read_content_type(&path).await?,
        }))
    }

    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| GalleryError::Store(format!("Failed to create directory: {e}")))?;
        }

        let sidecar = serde_json::to_vec(&Sidecar {
            content_type: content_type.to_string(),
        })?;
        Self::write_atomic(&Self::sidecar_path(&path), &sidecar)
            .await
            .map_err(|e| GalleryError::Store(format!("Failed to write metadata: {e}")))?;
        Self::write_atomic(&path, &body)
            .await
            .map_err(|e| GalleryError::Store(format!("Failed to write {key}: {e}")))?;

        tracing::debug!(key, bytes = body.len(), content_type, "Object written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip_with_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path()).await.unwrap();

        store
            .put("images/x.jpg", Bytes::from_static(b"bytes"), "image/webp")
            .await
            .unwrap();

        let meta = store.head("images/x.jpg").await.unwrap().unwrap();
        assert_eq!(meta.content_type, "image/webp");
        assert_eq!(meta.size, 5);

        let object = store.get("images/x.jpg").await.unwrap().unwrap();
        assert_eq!(object.body.as_ref(), b"bytes");
        assert!(dir.path().join("images/x.jpg.meta.json").exists());
    }

    #[tokio::test]
    async fn test_missing_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path()).await.unwrap();

        assert!(store.head("images/none.jpg").await.unwrap().is_none());
        assert!(store.get("images/none.jpg").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path()).await.unwrap();

        assert!(store.head("../outside.jpg").await.is_err());
        assert!(store
            .put("/abs.jpg", Bytes::from_static(b"x"), "image/jpeg")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_concurrent_puts_never_expose_partial_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path()).await.unwrap();
        store
            .put("images/r.jpg", Bytes::from_static(b"first"), "image/png")
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    store
                        .put("images/r.jpg", Bytes::from_static(b"again"), "image/png")
                        .await
                        .map(|_| ())
                } else {
                    store.get("images/r.jpg").await.map(|_| ())
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let object = store.get("images/r.jpg").await.unwrap().unwrap();
        assert_eq!(object.content_type, "image/png");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("images"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
