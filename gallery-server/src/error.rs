//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gallery_core::GalleryError;
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Not found - requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Required configuration is missing
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Gallery core error - upstream, cache or serialization failure
    #[error("Gallery error: {0}")]
    Gallery(#[from] GalleryError),
}

impl ApiError {
    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Configuration(_) | Self::Gallery(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for programmatic error handling
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Gallery(ref e) => match e {
                GalleryError::UpstreamStatus { .. }
                | GalleryError::Source(_)
                | GalleryError::Http(_) => "UPSTREAM_ERROR",
                GalleryError::Store(_) => "STORE_ERROR",
                GalleryError::Cache(_) => "CACHE_ERROR",
                GalleryError::Fetch(_) => "FETCH_ERROR",
                GalleryError::Serialization(_) => "SERIALIZATION_ERROR",
                GalleryError::Resize(_) => "RESIZE_ERROR",
            },
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            // For gallery errors, keep upstream details out of the response
            Self::Gallery(ref e) => match e {
                GalleryError::UpstreamStatus { service, status } => {
                    format!("Upstream {service} returned status {status}")
                }
                GalleryError::Source(_) | GalleryError::Http(_) => {
                    "Upstream metadata source unavailable".to_string()
                }
                GalleryError::Store(_) => "Image store error".to_string(),
                GalleryError::Cache(_) => "Cache error".to_string(),
                GalleryError::Fetch(_) => "Image fetch error".to_string(),
                GalleryError::Serialization(_) => "Serialization error".to_string(),
                GalleryError::Resize(_) => "Image processing error".to_string(),
            },
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Configuration(_) => "configuration",
            Self::Gallery(_) => "gallery",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        match &self {
            Self::NotFound(_) => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Client error"
                );
            }
            Self::Configuration(_) => {
                tracing::error!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Server error"
                );
            }
            Self::Gallery(_) => {
                tracing::error!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    client_message = %client_message,
                    "Gallery error (internal details logged)"
                );
            }
        }

        // All error responses include a `code` field for programmatic error handling
        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
