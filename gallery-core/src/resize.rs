//! Optional resize passthrough.
//!
//! The serving path delegates to an [`ImageResizer`] when one is configured
//! and falls back to the original bytes otherwise.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Largest accepted target width.
pub const MAX_WIDTH: u32 = 4096;

/// JPEG quality used when only a width is requested.
pub const DEFAULT_QUALITY: u8 = 80;

/// Resize parameters from the query string (`?w=640&q=75`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResizeParams {
    pub width: Option<u32>,
    pub quality: Option<u8>,
}

impl ResizeParams {
    /// Parse raw `w` and `q` query values. Unparseable or out-of-range
    /// values are dropped rather than rejected.
    pub fn parse(width: Option<&str>, quality: Option<&str>) -> Self {
        Self {
            width: width.and_then(|w| w.trim().parse().ok()),
            quality: quality.and_then(|q| q.trim().parse().ok()),
        }
        .sanitized()
    }

    /// Drop out-of-range values.
    pub fn sanitized(self) -> Self {
        Self {
            width: self.width.filter(|w| (1..=MAX_WIDTH).contains(w)),
            quality: self.quality.filter(|q| (1..=100).contains(q)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width.is_none() && self.quality.is_none()
    }
}

/// Resized image output.
#[derive(Debug, Clone)]
pub struct ResizedImage {
    pub body: Bytes,
    pub content_type: String,
}

/// Image-processing capability.
#[async_trait]
pub trait ImageResizer: Send + Sync {
    async fn resize(
        &self,
        body: Bytes,
        content_type: &str,
        params: ResizeParams,
    ) -> Result<ResizedImage>;
}

#[cfg(feature = "resize")]
pub use imp::ImageCrateResizer;

#[cfg(feature = "resize")]
mod imp {
    use std::io::Cursor;

    use async_trait::async_trait;
    use bytes::Bytes;
    use image::codecs::jpeg::JpegEncoder;
    use image::imageops::FilterType;

    use super::{ImageResizer, ResizeParams, ResizedImage, DEFAULT_QUALITY};
    use crate::error::{GalleryError, Result};

    /// Resizer backed by the `image` crate.
    ///
    /// Scales down to the requested width keeping the aspect ratio (never
    /// upscales) and re-encodes as JPEG.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct ImageCrateResizer;

    impl ImageCrateResizer {
        fn resize_blocking(body: &[u8], params: ResizeParams) -> Result<Vec<u8>> {
            let img = image::load_from_memory(body)
                .map_err(|e| GalleryError::Resize(format!("Failed to decode image: {e}")))?;

            let img = match params.width {
                Some(width) if width < img.width() => {
                    let height = (u64::from(img.height()) * u64::from(width)
                        / u64::from(img.width()))
                    .max(1) as u32;
                    img.resize_exact(width, height, FilterType::Lanczos3)
                }
                _ => img,
            };

            let mut out = Cursor::new(Vec::new());
            let quality = params.quality.unwrap_or(DEFAULT_QUALITY);
            img.to_rgb8()
                .write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))
                .map_err(|e| GalleryError::Resize(format!("Failed to encode image: {e}")))?;
            Ok(out.into_inner())
        }
    }

    #[async_trait]
    impl ImageResizer for ImageCrateResizer {
        async fn resize(
            &self,
            body: Bytes,
            _content_type: &str,
            params: ResizeParams,
        ) -> Result<ResizedImage> {
            let out = tokio::task::spawn_blocking(move || Self::resize_blocking(&body, params))
                .await
                .map_err(|e| GalleryError::Resize(format!("Resize task failed: {e}")))??;

            Ok(ResizedImage {
                body: Bytes::from(out),
                content_type: "image/jpeg".to_string(),
            })
        }
    }

}
