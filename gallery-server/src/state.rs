//! Application state module
//!
//! Defines shared state accessible across all request handlers. Every
//! store and upstream handle is injected here; handlers never reach for
//! process-wide globals.

use std::sync::Arc;
use std::time::Duration;

use gallery_core::{
    FsObjectStore, HttpImageOrigin, ImageCache, ImageResizer, MemoryCacheStore,
    MemoryObjectStore, MetadataSource, NotionClient, NotionConfig, ObjectStore, ResponseCache,
    Transformer,
};

use crate::config::Config;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Record projection; `None` when Notion is not configured
    pub transformer: Option<Transformer>,
    /// Names the missing setting when `transformer` is `None`
    pub missing_setting: Option<&'static str>,
    /// Durable image cache
    pub images: ImageCache,
    /// Metadata response cache
    pub responses: ResponseCache,
    /// Optional resize capability
    pub resizer: Option<Arc<dyn ImageResizer>>,
    /// Metadata cache TTL
    pub metadata_ttl: Duration,
}

impl AppState {
    /// Assemble state from already-built collaborators.
    pub fn new(
        source: Option<Arc<dyn MetadataSource>>,
        images: ImageCache,
        responses: ResponseCache,
        config: &Config,
    ) -> Self {
        let transformer = source.map(|source| {
            Transformer::new(source, images.clone(), config.image_cache_deadline())
        });
        let missing_setting = if transformer.is_some() {
            None
        } else {
            Some(config.missing_notion_setting().unwrap_or("NOTION_TOKEN"))
        };

        Self {
            transformer,
            missing_setting,
            images,
            responses,
            resizer: None,
            metadata_ttl: config.metadata_ttl(),
        }
    }

    /// Attach a resizer.
    pub fn with_resizer(mut self, resizer: Arc<dyn ImageResizer>) -> Self {
        self.resizer = Some(resizer);
        self
    }

    /// Build production state from configuration.
    pub async fn from_config(config: &Config) -> gallery_core::Result<Self> {
        let store: Arc<dyn ObjectStore> = match &config.image_store_dir {
            Some(dir) => Arc::new(FsObjectStore::new(dir).await?),
            None => {
                tracing::warn!("IMAGE_STORE_DIR not set, cached images will be lost on restart");
                Arc::new(MemoryObjectStore::new())
            }
        };
        let origin = Arc::new(
            HttpImageOrigin::new(config.image_http())?.with_max_body_bytes(config.image_max_bytes),
        );
        let images = ImageCache::new(store, origin, config.public_base_url.clone());
        let cache_store = Arc::new(MemoryCacheStore::new());
        cache_store.spawn_sweeper(config.metadata_ttl());
        let responses = ResponseCache::new(cache_store);

        let source: Option<Arc<dyn MetadataSource>> =
            match (&config.notion_token, &config.notion_database_id) {
                (Some(token), Some(database_id)) => {
                    let mut notion = NotionConfig::new(token.clone(), database_id.clone());
                    notion.api_base = config.notion_api_base.clone();
                    Some(Arc::new(NotionClient::new(notion)?))
                }
                _ => {
                    tracing::warn!(
                        missing = config.missing_notion_setting().unwrap_or_default(),
                        "Notion not configured, metadata endpoints will return 500"
                    );
                    None
                }
            };

        let state = Self::new(source, images, responses, config);

        #[cfg(feature = "resize")]
        let state = if config.resize_enabled {
            state.with_resizer(Arc::new(gallery_core::ImageCrateResizer))
        } else {
            state
        };

        Ok(state)
    }

    /// The transformer, or a configuration error naming what is missing.
    pub fn transformer(&self) -> Result<&Transformer, crate::error::ApiError> {
        self.transformer.as_ref().ok_or_else(|| {
            crate::error::ApiError::configuration(format!(
                "{} is not set",
                self.missing_setting.unwrap_or("NOTION_TOKEN")
            ))
        })
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("notion_configured", &self.transformer.is_some())
            .field("resizer", &self.resizer.is_some())
            .field("metadata_ttl", &self.metadata_ttl)
            .finish_non_exhaustive()
    }
}
