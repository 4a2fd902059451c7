use thiserror::Error;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("Object store error: {0}")]
    Store(String),

    #[error("Metadata cache error: {0}")]
    Cache(String),

    #[error("Image fetch error: {0}")]
    Fetch(String),

    #[error("Upstream {service} returned status {status}")]
    UpstreamStatus { service: &'static str, status: u16 },

    #[error("Metadata source error: {0}")]
    Source(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Resize error: {0}")]
    Resize(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, GalleryError>;
