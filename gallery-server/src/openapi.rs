//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3 document served at `/api-docs/openapi.json`.

use gallery_core::{CollectionDetail, CollectionRecord};
use utoipa::OpenApi;

use crate::handlers::{HealthResponse, ReadyResponse};

/// Notion Gallery API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Notion Gallery API",
        version = "0.1.0",
        description = r#"
## Notion database as a gallery API

Publishes the pages of one Notion database as JSON collections. Images
attached to pages are copied once into a durable store and served from
stable URLs under `/images/`, so links keep working after Notion's signed
file URLs expire.

### Caching

- Metadata responses are cached for a short TTL and carry `X-Cache: HIT|MISS`
- Images never change once stored and are served `immutable`
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    tags(
        (name = "Collections", description = "Published Notion pages with stable image URLs"),
        (name = "Images", description = "Durably cached images"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::collections::list_collections,
        crate::handlers::collections::get_collection,
        crate::handlers::images::serve_image,
        crate::handlers::health::health,
        crate::handlers::health::ready,
    ),
    components(
        schemas(
            CollectionRecord,
            CollectionDetail,
            HealthResponse,
            ReadyResponse,
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_public_paths() {
        let doc = ApiDoc::openapi();
        for path in ["/api/collections", "/api/collection/{id}", "/images/{file}", "/health"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
