//! Projection of upstream records into the public JSON shape.
//!
//! Every image reference is stabilized through the [`ImageCache`]; all
//! images of a response are cached concurrently.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::Result;
use crate::image_cache::{ImageCache, ImageReference};
use crate::record::{FileRef, SourceRecord};
use crate::source::MetadataSource;
use crate::stable_id::record_hint;

/// Property aliases, checked in order.
pub const TITLE_ALIASES: &[&str] = &["name", "title"];
pub const DESCRIPTION_ALIASES: &[&str] = &["description", "summary", "desc"];
pub const PRICE_ALIASES: &[&str] = &["price", "cost", "amount"];
pub const CATEGORY_ALIASES: &[&str] = &["category", "type", "tags"];
pub const IMAGE_ALIASES: &[&str] = &["images", "image", "photos", "gallery", "files"];

/// Number of images shown in a listing card.
pub const PREVIEW_COUNT: usize = 3;

/// Listing projection of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRecord {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    /// Stable URL of the first image.
    pub cover: Option<String>,
    /// Stable URLs of the first few images.
    pub preview_images: Vec<String>,
    pub image_count: usize,
    pub last_edited: Option<DateTime<Utc>>,
}

/// Detail projection of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDetail {
    #[serde(flatten)]
    pub record: CollectionRecord,
    /// Stable URLs of every image.
    pub images: Vec<String>,
    /// Other free-text properties by normalized name.
    pub fields: BTreeMap<String, String>,
}

/// Maps source records to projections, caching their images.
#[derive(Clone)]
pub struct Transformer {
    source: Arc<dyn MetadataSource>,
    images: ImageCache,
    image_deadline: Duration,
}

impl Transformer {
    pub fn new(source: Arc<dyn MetadataSource>, images: ImageCache, image_deadline: Duration) -> Self {
        Self {
            source,
            images,
            image_deadline,
        }
    }

    /// Project every record for the listing.
    ///
    /// Only the preview images of each record are cached.
    pub async fn list(&self) -> Result<Vec<CollectionRecord>> {
        let records = self.source.list_records().await?;

        let mut refs = Vec::new();
        let mut spans = Vec::with_capacity(records.len());
        for record in &records {
            let record_refs = image_references(record);
            let take = record_refs.len().min(PREVIEW_COUNT);
            spans.push((refs.len(), take, record_refs.len()));
            refs.extend(record_refs.into_iter().take(take));
        }

        let urls = self.images.cache_all(&refs, self.image_deadline).await;

        Ok(records
            .iter()
            .zip(spans)
            .map(|(record, (start, take, total))| {
                project(record, urls[start..start + take].to_vec(), total)
            })
            .collect())
    }

    /// Project one record with all of its images, `None` if absent.
    pub async fn detail(&self, id: &str) -> Result<Option<CollectionDetail>> {
        let Some(record) = self.source.get_record(id).await? else {
            return Ok(None);
        };

        let refs = image_references(&record);
        let urls = self.images.cache_all(&refs, self.image_deadline).await;

        let preview = urls.iter().take(PREVIEW_COUNT).cloned().collect();
        let fields = record
            .properties
            .iter()
            .filter(|(name, _)| !is_mapped(name))
            .filter_map(|(name, value)| value.as_text().map(|text| (name.clone(), text)))
            .collect();

        Ok(Some(CollectionDetail {
            record: project(&record, preview, urls.len()),
            images: urls,
            fields,
        }))
    }
}

impl std::fmt::Debug for Transformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transformer")
            .field("images", &self.images)
            .field("image_deadline", &self.image_deadline)
            .finish_non_exhaustive()
    }
}

/// Image references of a record, in display order.
///
/// Falls back to the page cover when the record has no image property.
pub fn image_references(record: &SourceRecord) -> Vec<ImageReference> {
    let files = record.properties.files(IMAGE_ALIASES);
    if files.is_empty() {
        return record
            .cover
            .iter()
            .map(|cover| reference(record, cover, "cover"))
            .collect();
    }

    files
        .iter()
        .enumerate()
        .map(|(index, file)| reference(record, file, index))
        .collect()
}

fn reference(record: &SourceRecord, file: &FileRef, slot: impl Display) -> ImageReference {
    let hint = record_hint(&record.id, slot);
    ImageReference::new(file.url.clone(), Some(&hint))
}

fn project(record: &SourceRecord, preview_images: Vec<String>, image_count: usize) -> CollectionRecord {
    let props = &record.properties;
    CollectionRecord {
        id: record.id.clone(),
        title: props.text(TITLE_ALIASES).unwrap_or_default(),
        description: props.text(DESCRIPTION_ALIASES),
        category: props.text(CATEGORY_ALIASES),
        price: props.number(PRICE_ALIASES),
        cover: preview_images.first().cloned(),
        preview_images,
        image_count,
        last_edited: record.last_edited,
    }
}

fn is_mapped(name: &str) -> bool {
    [
        TITLE_ALIASES,
        DESCRIPTION_ALIASES,
        PRICE_ALIASES,
        CATEGORY_ALIASES,
        IMAGE_ALIASES,
    ]
    .iter()
    .any(|aliases| aliases.contains(&name))
}
