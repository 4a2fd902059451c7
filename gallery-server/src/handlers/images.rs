//! Image serving handler
//!
//! Serves images from the durable store under their stable identifier.
//! Stored bytes never change for a given identifier, so every successful
//! response is marked immutable.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use gallery_core::{stable_id, CachePolicy, ResizeParams};

use crate::error::ApiError;
use crate::state::AppState;

/// Split `{stable_id}.{ext}` and validate the identifier.
///
/// The extension is informational; every image is stored under one key
/// regardless of what the client asks for.
pub fn parse_image_file(file: &str) -> Option<&str> {
    let id = file.rsplit_once('.').map_or(file, |(id, _ext)| id);
    stable_id::is_valid_stable_id(id).then_some(id)
}

/// GET /images/{file} - Serve a cached image
#[utoipa::path(
    get,
    path = "/images/{file}",
    tag = "Images",
    params(
        ("file" = String, Path, description = "Stable image ID with extension, e.g. `abc-0.jpg`"),
        ("w" = Option<u32>, Query, description = "Target width, 1 to 4096"),
        ("q" = Option<u8>, Query, description = "JPEG quality, 1 to 100")
    ),
    responses(
        (status = 200, description = "Image bytes", content_type = "image/*"),
        (status = 404, description = "Image not cached or malformed ID")
    )
)]
pub async fn serve_image(
    State(state): State<AppState>,
    Path(file): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let stable_id =
        parse_image_file(&file).ok_or_else(|| ApiError::not_found(format!("Image {file}")))?;

    let object = state
        .images
        .load(stable_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Image {stable_id}")))?;

    let mut body = object.body;
    let mut content_type = object.content_type;

    let params = ResizeParams::parse(
        query.get("w").map(String::as_str),
        query.get("q").map(String::as_str),
    );
    if let (Some(resizer), false) = (&state.resizer, params.is_empty()) {
        match resizer.resize(body.clone(), &content_type, params).await {
            Ok(resized) => {
                body = resized.body;
                content_type = resized.content_type;
            }
            Err(e) => {
                tracing::warn!(stable_id, error = %e, "Resize failed, serving original");
            }
        }
    }

    let content_type = HeaderValue::from_str(&content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(gallery_core::store::DEFAULT_CONTENT_TYPE));
    let cache_control = HeaderValue::from_str(&CachePolicy::Immutable.cache_control())
        .unwrap_or_else(|_| HeaderValue::from_static("public, max-age=31536000, immutable"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, cache_control),
        ],
        body,
    )
        .into_response())
}
