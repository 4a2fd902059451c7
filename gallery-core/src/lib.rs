//! Gallery Core - stable image URLs and projections for a Notion-backed gallery
//!
//! Notion serves uploaded files from signed storage URLs that expire after a
//! few hours. This crate turns them into stable URLs served from a durable
//! object store, fetching each image at most once, and projects Notion pages
//! into a flat JSON shape.
//!
//! # Components
//!
//! - [`stable_id`]: content-stable identifiers from transient URLs
//! - [`ImageCache`]: at-most-once fetch-and-persist with fallback to the source URL
//! - [`ResponseCache`]: read-through metadata cache with fixed TTL policies
//! - [`Transformer`]: upstream records to [`CollectionRecord`] / [`CollectionDetail`]
//! - [`NotionClient`]: the Notion API as a [`MetadataSource`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gallery_core::{HttpConfig, HttpImageOrigin, ImageCache, MemoryObjectStore};
//!
//! # async fn example() -> gallery_core::Result<()> {
//! let images = ImageCache::new(
//!     Arc::new(MemoryObjectStore::new()),
//!     Arc::new(HttpImageOrigin::new(HttpConfig::default())?),
//!     "https://gallery.example.com",
//! );
//!
//! let signed = "https://files.example.com/ws/c0ffee00-1111-4222-8333-444455556666/a.jpg?sig=x";
//! let stable_id = gallery_core::stable_id::derive(signed, None);
//! let url = images.ensure_cached(signed, &stable_id).await;
//! println!("serve {url}");
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod clock;
pub mod error;
pub mod http;
pub mod image_cache;
pub mod notion;
pub mod origin;
pub mod record;
pub mod resize;
pub mod source;
pub mod stable_id;
pub mod store;
pub mod transform;

// Re-export main types for convenience
pub use cache::{
    collection_key, CachePolicy, CacheStatus, CacheStore, Cached, MemoryCacheStore, ResponseCache,
    COLLECTIONS_KEY,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{GalleryError, Result};
pub use http::HttpConfig;
pub use image_cache::{ImageCache, ImageReference};
pub use notion::{NotionClient, NotionConfig};
pub use origin::{FetchedImage, HttpImageOrigin, ImageOrigin};
pub use record::{FileHosting, FileRef, PropertyBag, PropertyValue, SourceRecord};
pub use resize::{ImageResizer, ResizeParams, ResizedImage};
pub use source::MetadataSource;
pub use store::{image_key, FsObjectStore, MemoryObjectStore, ObjectMeta, ObjectStore, StoredObject};
pub use transform::{CollectionDetail, CollectionRecord, Transformer};

#[cfg(feature = "resize")]
pub use resize::ImageCrateResizer;
