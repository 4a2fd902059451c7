//! API integration tests for gallery-server.
//!
//! These tests drive the full router against in-memory stores with mock
//! metadata sources and image origins, covering the listing, detail, image
//! and preflight paths end to end.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use bytes::Bytes;
use gallery_core::{
    FetchedImage, FileHosting, FileRef, GalleryError, ImageCache, ImageOrigin, ImageResizer,
    MemoryCacheStore, MemoryObjectStore, MetadataSource, PropertyBag, PropertyValue,
    ResizeParams, ResizedImage, ResponseCache, SourceRecord,
};
use gallery_server::{create_router, AppState, Config};
use serde_json::Value;
use tower::ServiceExt;

const BASE: &str = "https://gallery.example.com";
const RECORD_ID: &str = "c0ffee00-1111-4222-8333-444455556666";
const NOTION_SIGNED_URL: &str = "https://prod-files-secure.s3.us-west-2.amazonaws.com/0d1e2f30-aaaa-4bbb-8ccc-ddddeeeeffff/9a8b7c6d-1234-4567-89ab-cdef01234567/market.png?X-Amz-Algorithm=AWS4-HMAC-SHA256&X-Amz-Expires=3600&X-Amz-Signature=deadbeef";
const EXTERNAL_URL: &str = "https://images.example.org/stall.jpg";

// ============================================================================
// Test doubles
// ============================================================================

struct StaticSource(Vec<SourceRecord>);

#[async_trait]
impl MetadataSource for StaticSource {
    async fn list_records(&self) -> gallery_core::Result<Vec<SourceRecord>> {
        Ok(self.0.clone())
    }

    async fn get_record(&self, id: &str) -> gallery_core::Result<Option<SourceRecord>> {
        Ok(self.0.iter().find(|r| r.id == id).cloned())
    }
}

struct FailingSource;

#[async_trait]
impl MetadataSource for FailingSource {
    async fn list_records(&self) -> gallery_core::Result<Vec<SourceRecord>> {
        Err(GalleryError::UpstreamStatus {
            service: "notion",
            status: 502,
        })
    }

    async fn get_record(&self, _id: &str) -> gallery_core::Result<Option<SourceRecord>> {
        Err(GalleryError::Source("connection refused".into()))
    }
}

/// Serves `body:{url}` and counts downloads.
#[derive(Default)]
struct CountingOrigin {
    calls: AtomicUsize,
}

#[async_trait]
impl ImageOrigin for CountingOrigin {
    async fn fetch(&self, url: &str) -> gallery_core::Result<FetchedImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let content_type = url.contains(".png").then(|| "image/png".to_string());
        Ok(FetchedImage {
            body: Bytes::from(format!("body:{url}")),
            content_type,
        })
    }
}

struct UppercaseResizer;

#[async_trait]
impl ImageResizer for UppercaseResizer {
    async fn resize(
        &self,
        body: Bytes,
        _content_type: &str,
        params: ResizeParams,
    ) -> gallery_core::Result<ResizedImage> {
        if params.width == Some(13) {
            return Err(GalleryError::Resize("unlucky width".into()));
        }
        Ok(ResizedImage {
            body: Bytes::from(body.to_ascii_uppercase()),
            content_type: "image/jpeg".to_string(),
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn market_record() -> SourceRecord {
    let mut properties = PropertyBag::new();
    properties.insert("Name", PropertyValue::Text("Saturday Market".into()));
    properties.insert("Price", PropertyValue::Number(24.0));
    properties.insert("Category", PropertyValue::Select("Prints".into()));
    properties.insert("Photographer", PropertyValue::Text("R. Okafor".into()));
    properties.insert(
        "Images",
        PropertyValue::Files(vec![
            FileRef {
                name: Some("market.png".into()),
                url: NOTION_SIGNED_URL.into(),
                hosting: FileHosting::Notion,
            },
            FileRef {
                name: None,
                url: EXTERNAL_URL.into(),
                hosting: FileHosting::External,
            },
        ]),
    );

    SourceRecord {
        id: RECORD_ID.into(),
        last_edited: None,
        cover: None,
        properties,
    }
}

struct TestApp {
    router: Router,
    origin: Arc<CountingOrigin>,
}

fn build_app(source: Option<Arc<dyn MetadataSource>>, resizer: bool) -> TestApp {
    let config = Config {
        public_base_url: BASE.into(),
        ..Config::default()
    };
    let origin = Arc::new(CountingOrigin::default());
    let images = ImageCache::new(Arc::new(MemoryObjectStore::new()), origin.clone(), BASE);
    let responses = ResponseCache::new(Arc::new(MemoryCacheStore::new()));

    let mut state = AppState::new(source, images, responses, &config);
    if resizer {
        state = state.with_resizer(Arc::new(UppercaseResizer));
    }

    TestApp {
        router: create_router(state, &config),
        origin,
    }
}

fn create_test_app() -> TestApp {
    build_app(Some(Arc::new(StaticSource(vec![market_record()]))), false)
}

async fn send(router: &Router, method: &str, uri: &str) -> Response {
    router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_bytes(response: Response) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn header_str<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

fn first_image_id() -> String {
    format!("{}-0", RECORD_ID.replace('-', ""))
}

// ============================================================================
// Health & Readiness Tests
// ============================================================================

#[tokio::test]
async fn test_health_reports_notion_configured() {
    let app = create_test_app();
    let response = send(&app.router, "GET", "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["notion_configured"], true);
    assert_eq!(json["service"], "gallery-server");
}

#[tokio::test]
async fn test_health_degraded_without_notion() {
    let app = build_app(None, false);
    let json = body_json(send(&app.router, "GET", "/health").await).await;

    assert_eq!(json["status"], "degraded");
    assert_eq!(json["notion_configured"], false);
}

#[tokio::test]
async fn test_ready() {
    let app = create_test_app();
    let response = send(&app.router, "GET", "/ready").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["ready"], true);
}

#[tokio::test]
async fn test_openapi_document_served() {
    let app = create_test_app();
    let response = send(&app.router, "GET", "/api-docs/openapi.json").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["paths"]["/api/collections"].is_object());
}

// ============================================================================
// Collections Tests
// ============================================================================

#[tokio::test]
async fn test_collections_end_to_end() {
    let app = create_test_app();
    let response = send(&app.router, "GET", "/api/collections").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "x-cache"), Some("MISS"));
    assert_eq!(
        header_str(&response, "cache-control"),
        Some("public, max-age=300")
    );

    let json = body_json(response).await;
    let item = &json[0];
    let cover = format!("{BASE}/images/{}.jpg", first_image_id());
    assert_eq!(item["id"], RECORD_ID);
    assert_eq!(item["title"], "Saturday Market");
    assert_eq!(item["price"], 24.0);
    assert_eq!(item["category"], "Prints");
    assert_eq!(item["imageCount"], 2);
    assert_eq!(item["cover"], cover.as_str());

    let previews: Vec<&str> = item["previewImages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(previews.len(), 2);
    assert!(previews.iter().all(|url| url.starts_with(BASE)));
    assert!(!previews.iter().any(|url| url.contains("X-Amz-Signature")));

    // The stable URL serves the stored bytes with the origin's content type
    let path = cover.trim_start_matches(BASE).to_string();
    let image = send(&app.router, "GET", &path).await;
    assert_eq!(image.status(), StatusCode::OK);
    assert_eq!(header_str(&image, "content-type"), Some("image/png"));
    assert_eq!(
        header_str(&image, "cache-control"),
        Some("public, max-age=31536000, immutable")
    );
    assert_eq!(
        body_bytes(image).await,
        Bytes::from(format!("body:{NOTION_SIGNED_URL}"))
    );
}

#[tokio::test]
async fn test_collections_cache_hit_is_byte_identical() {
    let app = create_test_app();

    let first = send(&app.router, "GET", "/api/collections").await;
    assert_eq!(header_str(&first, "x-cache"), Some("MISS"));
    let first_body = body_bytes(first).await;

    let second = send(&app.router, "GET", "/api/collections").await;
    assert_eq!(header_str(&second, "x-cache"), Some("HIT"));
    let second_body = body_bytes(second).await;

    assert_eq!(first_body, second_body);
    assert_eq!(app.origin.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_collection_detail() {
    let app = create_test_app();
    let uri = format!("/api/collection/{RECORD_ID}");

    let response = send(&app.router, "GET", &uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "x-cache"), Some("MISS"));

    let json = body_json(response).await;
    assert_eq!(json["id"], RECORD_ID);
    assert_eq!(json["images"].as_array().unwrap().len(), 2);
    assert_eq!(json["fields"]["photographer"], "R. Okafor");

    let again = send(&app.router, "GET", &uri).await;
    assert_eq!(header_str(&again, "x-cache"), Some("HIT"));
}

#[tokio::test]
async fn test_images_downloaded_once_across_endpoints() {
    let app = create_test_app();

    send(&app.router, "GET", "/api/collections").await;
    send(&app.router, "GET", &format!("/api/collection/{RECORD_ID}")).await;

    assert_eq!(app.origin.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unknown_collection_is_404() {
    let app = create_test_app();
    let response = send(&app.router, "GET", "/api/collection/nope").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_missing_configuration_is_500() {
    let app = build_app(None, false);
    let response = send(&app.router, "GET", "/api/collections").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["code"], "CONFIGURATION_ERROR");
    assert!(json["error"].as_str().unwrap().contains("NOTION_TOKEN"));
}

#[tokio::test]
async fn test_upstream_failure_is_500() {
    let app = build_app(Some(Arc::new(FailingSource)), false);

    let list = send(&app.router, "GET", "/api/collections").await;
    assert_eq!(list.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(list).await["code"], "UPSTREAM_ERROR");

    let detail = send(&app.router, "GET", "/api/collection/abc").await;
    assert_eq!(detail.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(detail).await["code"], "UPSTREAM_ERROR");
}

// ============================================================================
// Image Tests
// ============================================================================

#[tokio::test]
async fn test_unknown_image_is_404() {
    let app = create_test_app();
    let response = send(&app.router, "GET", "/images/never-cached.jpg").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_image_id_is_404() {
    let app = create_test_app();
    let response = send(&app.router, "GET", "/images/bad%20id.jpg").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_resize_delegates_and_falls_back() {
    let app = build_app(Some(Arc::new(StaticSource(vec![market_record()]))), true);
    send(&app.router, "GET", "/api/collections").await;
    let path = format!("/images/{}.jpg", first_image_id());

    let resized = send(&app.router, "GET", &format!("{path}?w=64")).await;
    assert_eq!(header_str(&resized, "content-type"), Some("image/jpeg"));
    assert_eq!(
        body_bytes(resized).await,
        Bytes::from(format!("body:{NOTION_SIGNED_URL}").to_ascii_uppercase())
    );

    let failed = send(&app.router, "GET", &format!("{path}?w=13")).await;
    assert_eq!(failed.status(), StatusCode::OK);
    assert_eq!(header_str(&failed, "content-type"), Some("image/png"));
    assert_eq!(
        body_bytes(failed).await,
        Bytes::from(format!("body:{NOTION_SIGNED_URL}"))
    );

    let plain = send(&app.router, "GET", &path).await;
    assert_eq!(header_str(&plain, "content-type"), Some("image/png"));
}

#[tokio::test]
async fn test_unparseable_resize_params_serve_original() {
    let app = build_app(Some(Arc::new(StaticSource(vec![market_record()]))), true);
    send(&app.router, "GET", "/api/collections").await;
    let path = format!("/images/{}.jpg", first_image_id());

    for query in ["q=300", "w=abc", "w=-1", "w=5000&q=0", "w=&q="] {
        let response = send(&app.router, "GET", &format!("{path}?{query}")).await;
        assert_eq!(response.status(), StatusCode::OK, "query {query}");
        assert_eq!(header_str(&response, "content-type"), Some("image/png"));
        assert_eq!(
            body_bytes(response).await,
            Bytes::from(format!("body:{NOTION_SIGNED_URL}")),
            "query {query}"
        );
    }
}

// ============================================================================
// Routing & CORS Tests
// ============================================================================

#[tokio::test]
async fn test_options_is_204_with_cors() {
    let app = create_test_app();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/collections")
                .header(header::ORIGIN, "https://shop.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        header_str(&response, "access-control-allow-origin"),
        Some("*")
    );
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_options_on_unknown_path_is_204() {
    let app = create_test_app();
    let response = send(&app.router, "OPTIONS", "/anything/at/all").await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_cors_header_on_get() {
    let app = create_test_app();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, "https://shop.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        header_str(&response, "access-control-allow-origin"),
        Some("*")
    );
}

#[tokio::test]
async fn test_unknown_route_is_404_json() {
    let app = create_test_app();
    let response = send(&app.router, "GET", "/nonexistent").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}
