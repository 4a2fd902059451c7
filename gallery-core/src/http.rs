//! Shared outbound HTTP policy: timeout, bounded retry and backoff.
//!
//! Used by both the Notion client and the image origin.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::StatusCode;
use tracing::warn;

use crate::error::{GalleryError, Result};

/// Timeout and retry settings for an outbound client.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Retries after the first attempt, for transient failures only.
    pub max_retries: u32,
    /// Initial retry interval.
    pub initial_interval: Duration,
    /// Maximum retry interval.
    pub max_interval: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            max_retries: 1,
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_secs(2),
        }
    }
}

impl HttpConfig {
    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            max_elapsed_time: Some(self.timeout * (self.max_retries + 1)),
            ..Default::default()
        }
    }
}

/// Run `op` with exponential backoff, retrying transient errors at most
/// `config.max_retries` times.
pub async fn retry<T, F, Fut>(config: &HttpConfig, service: &'static str, op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, backoff::Error<GalleryError>>>,
{
    let attempts = AtomicU32::new(0);

    retry_notify(
        config.build_backoff(),
        || async {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            match op().await {
                Err(backoff::Error::Transient { err, .. }) if attempt >= config.max_retries => {
                    Err(backoff::Error::permanent(err))
                }
                other => other,
            }
        },
        |err: GalleryError, duration: Duration| {
            warn!(
                service,
                error = %err,
                retry_after_ms = duration.as_millis() as u64,
                "Retry scheduled"
            );
        },
    )
    .await
}

/// Classify a transport error.
pub fn classify(error: reqwest::Error) -> backoff::Error<GalleryError> {
    if is_transient_error(&error) {
        backoff::Error::transient(GalleryError::Http(error))
    } else {
        backoff::Error::permanent(GalleryError::Http(error))
    }
}

/// Classify a non-success HTTP status.
pub fn classify_status(service: &'static str, status: StatusCode) -> backoff::Error<GalleryError> {
    let err = GalleryError::UpstreamStatus {
        service,
        status: status.as_u16(),
    };
    if is_transient_status(status) {
        backoff::Error::transient(err)
    } else {
        backoff::Error::permanent(err)
    }
}

/// Check if a reqwest error is transient and should be retried.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

/// Check if an HTTP status code indicates a transient error.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}
