//! Image origin: fetches bytes from transient signed or external URLs.

use std::time::Instant;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::{header, Client};
use tracing::debug;

use crate::error::{GalleryError, Result};
use crate::http::{self, HttpConfig};

/// Client identifier sent with every origin request.
pub const USER_AGENT: &str = concat!("notion-gallery/", env!("CARGO_PKG_VERSION"));

/// Largest origin body accepted by default (25 MiB).
pub const DEFAULT_MAX_BODY_BYTES: u64 = 25 * 1024 * 1024;

/// Bytes fetched from an origin.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub body: Bytes,
    /// `Content-Type` reported by the origin, if any.
    pub content_type: Option<String>,
}

/// Source of image bytes.
#[async_trait]
pub trait ImageOrigin: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedImage>;
}

/// HTTP origin backed by reqwest.
///
/// Non-2xx responses are errors. Timeouts, connection failures and
/// 429/502/503/504 are retried per [`HttpConfig`]. Bodies larger than
/// `max_body_bytes` are rejected without retry, whether the size is
/// announced by `Content-Length` or discovered while streaming.
pub struct HttpImageOrigin {
    client: Client,
    config: HttpConfig,
    max_body_bytes: u64,
}

impl HttpImageOrigin {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GalleryError::Fetch(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        })
    }

    /// Override the body size limit.
    pub fn with_max_body_bytes(mut self, max: u64) -> Self {
        self.max_body_bytes = max;
        self
    }

    fn too_large(&self, size: u64) -> backoff::Error<GalleryError> {
        backoff::Error::permanent(GalleryError::Fetch(format!(
            "Origin body of {size} bytes exceeds limit of {} bytes",
            self.max_body_bytes
        )))
    }

    async fn fetch_once(
        &self,
        url: &str,
    ) -> std::result::Result<FetchedImage, backoff::Error<GalleryError>> {
        let start = Instant::now();

        let mut response = self
            .client
            .get(url)
            .header(header::ACCEPT, "image/*")
            .send()
            .await
            .map_err(http::classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(http::classify_status("image origin", status));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if let Some(len) = response.content_length() {
            if len > self.max_body_bytes {
                return Err(self.too_large(len));
            }
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(http::classify)? {
            let total = (body.len() + chunk.len()) as u64;
            if total > self.max_body_bytes {
                return Err(self.too_large(total));
            }
            body.extend_from_slice(&chunk);
        }
        let body = body.freeze();

        debug!(
            bytes = body.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Origin fetch completed"
        );

        Ok(FetchedImage { body, content_type })
    }
}

#[async_trait]
impl ImageOrigin for HttpImageOrigin {
    async fn fetch(&self, url: &str) -> Result<FetchedImage> {
        http::retry(&self.config, "image origin", || self.fetch_once(url)).await
    }
}
