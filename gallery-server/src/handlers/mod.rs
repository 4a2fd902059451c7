//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod collections;
pub mod health;
pub mod images;

pub use crate::state::AppState;
pub use collections::{get_collection, list_collections, X_CACHE};
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use images::serve_image;
