//! Collection metadata handlers
//!
//! Both endpoints read through the metadata cache. The cached value is the
//! serialized JSON body, so a hit is returned byte for byte.

use axum::{
    extract::{Path, State},
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
};
use gallery_core::{collection_key, CachePolicy, Cached, COLLECTIONS_KEY};

use crate::error::ApiError;
use crate::state::AppState;

/// Cache status header on metadata responses.
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

fn json_response(cached: Cached<String>, policy: CachePolicy) -> Response {
    let cache_control = HeaderValue::from_str(&policy.cache_control())
        .unwrap_or_else(|_| HeaderValue::from_static("no-cache"));

    (
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            ),
            (header::CACHE_CONTROL, cache_control),
            (X_CACHE, HeaderValue::from_static(cached.status.as_str())),
        ],
        cached.value,
    )
        .into_response()
}

/// GET /api/collections - List all published collections
#[utoipa::path(
    get,
    path = "/api/collections",
    tag = "Collections",
    responses(
        (status = 200, description = "Published collections with stable image URLs", body = [gallery_core::CollectionRecord]),
        (status = 500, description = "Notion not configured or unreachable")
    )
)]
pub async fn list_collections(State(state): State<AppState>) -> Result<Response, ApiError> {
    let transformer = state.transformer()?;
    let policy = CachePolicy::Metadata(state.metadata_ttl);

    let cached = state
        .responses
        .read_through(COLLECTIONS_KEY, policy, || transformer.list())
        .await?;

    tracing::debug!(cache = cached.status.as_str(), "Served collection list");
    Ok(json_response(cached, policy))
}

/// GET /api/collection/{id} - One collection with all of its images
#[utoipa::path(
    get,
    path = "/api/collection/{id}",
    tag = "Collections",
    params(
        ("id" = String, Path, description = "Notion page ID")
    ),
    responses(
        (status = 200, description = "Collection detail", body = gallery_core::CollectionDetail),
        (status = 404, description = "Collection not found"),
        (status = 500, description = "Notion not configured or unreachable")
    )
)]
pub async fn get_collection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let transformer = state.transformer()?;
    let policy = CachePolicy::Metadata(state.metadata_ttl);

    // Absent records are not cached, a page published later shows up at once
    let cached = state
        .responses
        .read_through_optional(&collection_key(&id), policy, || transformer.detail(&id))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Collection {id} not found")))?;

    tracing::debug!(id = %id, cache = cached.status.as_str(), "Served collection");
    Ok(json_response(cached, policy))
}
