//! Notion API metadata source.
//!
//! Queries one database for the listing and retrieves single pages for the
//! detail view. Pages that are archived, trashed or belong to another
//! database are treated as absent.

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use crate::error::{GalleryError, Result};
use crate::http::{self, HttpConfig};
use crate::origin::USER_AGENT;
use crate::record::SourceRecord;
use crate::source::MetadataSource;

/// Default Notion API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.notion.com/v1";

/// Notion API version sent with every request.
pub const NOTION_VERSION: &str = "2022-06-28";

/// Page size for database queries (Notion maximum).
const PAGE_SIZE: u32 = 100;

/// Configuration for [`NotionClient`].
#[derive(Debug, Clone)]
pub struct NotionConfig {
    /// Integration secret.
    pub token: String,
    /// Database whose pages are published.
    pub database_id: String,
    /// API base URL, without trailing slash.
    pub api_base: String,
    pub http: HttpConfig,
}

impl NotionConfig {
    pub fn new(token: impl Into<String>, database_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            database_id: database_id.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            http: HttpConfig::default(),
        }
    }
}

/// Notion REST client.
pub struct NotionClient {
    client: Client,
    config: NotionConfig,
}

impl NotionClient {
    pub fn new(mut config: NotionConfig) -> Result<Self> {
        config.api_base = config.api_base.trim_end_matches('/').to_string();

        let client = Client::builder()
            .timeout(config.http.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GalleryError::Source(format!("Failed to create HTTP client: {e}")))?;

        info!(database_id = %config.database_id, "Notion client created");
        Ok(Self { client, config })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.config.token)
            .header("Notion-Version", NOTION_VERSION)
            .header(header::ACCEPT, "application/json")
    }

    /// Send a request built by `make`, retrying transient failures.
    ///
    /// Returns the status and parsed body for every non-transient response,
    /// leaving status interpretation to the caller.
    async fn send<F>(&self, make: F) -> Result<(StatusCode, Value)>
    where
        F: Fn() -> RequestBuilder,
    {
        http::retry(&self.config.http, "notion", || async {
            let response = make().send().await.map_err(http::classify)?;
            let status = response.status();
            if http::is_transient_status(status) {
                return Err(http::classify_status("notion", status));
            }
            let body = response.json::<Value>().await.map_err(|e| {
                backoff::Error::permanent(GalleryError::Source(format!(
                    "Invalid Notion response: {e}"
                )))
            })?;
            Ok((status, body))
        })
        .await
    }

    fn is_published(&self, page: &Value) -> bool {
        if !is_live(page) {
            return false;
        }

        match page
            .get("parent")
            .and_then(|p| p.get("database_id"))
            .and_then(Value::as_str)
        {
            Some(parent) => same_id(parent, &self.config.database_id),
            None => false,
        }
    }
}

#[async_trait]
impl MetadataSource for NotionClient {
    #[instrument(level = "debug", skip(self))]
    async fn list_records(&self) -> Result<Vec<SourceRecord>> {
        let url = format!(
            "{}/databases/{}/query",
            self.config.api_base, self.config.database_id
        );
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(ref c) = cursor {
                body["start_cursor"] = Value::String(c.clone());
            }

            let (status, page) = self
                .send(|| self.authorized(self.client.post(&url)).json(&body))
                .await?;
            if !status.is_success() {
                return Err(upstream_error(status, &page));
            }

            let results = page
                .get("results")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            records.extend(
                results
                    .iter()
                    .filter(|p| is_live(p))
                    .filter_map(SourceRecord::from_notion_page),
            );

            cursor = match (
                page.get("has_more").and_then(Value::as_bool),
                page.get("next_cursor").and_then(Value::as_str),
            ) {
                (Some(true), Some(next)) => Some(next.to_string()),
                _ => break,
            };
            debug!(fetched = records.len(), "Fetching next Notion page");
        }

        info!(count = records.len(), "Fetched records from Notion");
        Ok(records)
    }

    #[instrument(level = "debug", skip(self))]
    async fn get_record(&self, id: &str) -> Result<Option<SourceRecord>> {
        let url = format!("{}/pages/{}", self.config.api_base, id);
        let (status, page) = self
            .send(|| self.authorized(self.client.get(&url)))
            .await?;

        if status == StatusCode::NOT_FOUND
            || (status == StatusCode::BAD_REQUEST
                && page.get("code").and_then(Value::as_str) == Some("validation_error"))
        {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(upstream_error(status, &page));
        }

        if !self.is_published(&page) {
            debug!("Page is not part of the published database");
            return Ok(None);
        }
        Ok(SourceRecord::from_notion_page(&page))
    }
}

impl std::fmt::Debug for NotionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionClient")
            .field("database_id", &self.config.database_id)
            .field("api_base", &self.config.api_base)
            .finish_non_exhaustive()
    }
}

fn upstream_error(status: StatusCode, body: &Value) -> GalleryError {
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("no message");
    tracing::warn!(status = %status, message, "Notion request failed");
    GalleryError::UpstreamStatus {
        service: "notion",
        status: status.as_u16(),
    }
}

/// Whether a page is neither archived nor in the trash.
fn is_live(page: &Value) -> bool {
    let flag = |name: &str| page.get(name).and_then(Value::as_bool).unwrap_or(false);
    !(flag("archived") || flag("in_trash"))
}

/// Compare Notion IDs, ignoring dashes and case.
pub fn same_id(a: &str, b: &str) -> bool {
    let norm = |s: &str| s.replace('-', "").to_ascii_lowercase();
    norm(a) == norm(b)
}
