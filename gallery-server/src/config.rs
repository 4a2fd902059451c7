//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use gallery_core::notion::DEFAULT_API_BASE;
use gallery_core::origin::DEFAULT_MAX_BODY_BYTES;
use gallery_core::HttpConfig;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Allowed CORS origins, comma-separated (default: allow all)
    pub allowed_origins: Option<Vec<String>>,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
    /// Notion integration secret
    pub notion_token: Option<String>,
    /// Notion database to publish
    pub notion_database_id: Option<String>,
    /// Notion API base URL
    pub notion_api_base: String,
    /// Prefix of stable image URLs (default: http://{host}:{port})
    pub public_base_url: String,
    /// Directory for the filesystem image store (default: in-memory)
    pub image_store_dir: Option<PathBuf>,
    /// Metadata cache TTL in seconds (default: 300)
    pub metadata_ttl_secs: u64,
    /// Origin fetch timeout in seconds (default: 15)
    pub image_fetch_timeout_secs: u64,
    /// Origin fetch retries on transient failure (default: 1)
    pub image_fetch_retries: u32,
    /// Largest origin image accepted, in bytes (default: 25 MiB)
    pub image_max_bytes: u64,
    /// How long a metadata response waits for its image tasks (default: 20)
    pub image_cache_deadline_secs: u64,
    /// Use the built-in resizer when compiled in (default: true)
    pub resize_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: [127, 0, 0, 1],
            allowed_origins: None, // None = allow all
            timeout_secs: 30,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            notion_token: None,
            notion_database_id: None,
            notion_api_base: DEFAULT_API_BASE.to_string(),
            public_base_url: "http://127.0.0.1:3000".to_string(),
            image_store_dir: None,
            metadata_ttl_secs: 300,
            image_fetch_timeout_secs: 15,
            image_fetch_retries: 1,
            image_max_bytes: DEFAULT_MAX_BODY_BYTES,
            image_cache_deadline_secs: 20,
            resize_enabled: true,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let port = env_parse("PORT", 3000);

        let host = std::env::var("HOST")
            .ok()
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or([127, 0, 0, 1]);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        // Rate limiting enabled by default in production, can be disabled with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let public_base_url = env_non_empty("PUBLIC_BASE_URL").unwrap_or_else(|| {
            let [a, b, c, d] = host;
            format!("http://{a}.{b}.{c}.{d}:{port}")
        });

        let resize_enabled = std::env::var("RESIZE_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        Self {
            port,
            host,
            allowed_origins,
            timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 30),
            rate_limit_enabled,
            rate_limit_per_sec: env_parse("RATE_LIMIT_PER_SEC", 10),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST", 20),
            notion_token: env_non_empty("NOTION_TOKEN"),
            notion_database_id: env_non_empty("NOTION_DATABASE_ID"),
            notion_api_base: env_non_empty("NOTION_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            public_base_url,
            image_store_dir: env_non_empty("IMAGE_STORE_DIR").map(PathBuf::from),
            metadata_ttl_secs: env_parse("METADATA_TTL_SECS", 300),
            image_fetch_timeout_secs: env_parse("IMAGE_FETCH_TIMEOUT_SECS", 15),
            image_fetch_retries: env_parse("IMAGE_FETCH_RETRIES", 1),
            image_max_bytes: env_parse("IMAGE_MAX_BYTES", DEFAULT_MAX_BODY_BYTES),
            image_cache_deadline_secs: env_parse("IMAGE_CACHE_DEADLINE_SECS", 20),
            resize_enabled,
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    /// Metadata cache TTL
    pub fn metadata_ttl(&self) -> Duration {
        Duration::from_secs(self.metadata_ttl_secs)
    }

    /// Deadline for the image tasks of one metadata response
    pub fn image_cache_deadline(&self) -> Duration {
        Duration::from_secs(self.image_cache_deadline_secs)
    }

    /// Outbound HTTP policy for image origins
    pub fn image_http(&self) -> HttpConfig {
        HttpConfig {
            timeout: Duration::from_secs(self.image_fetch_timeout_secs),
            max_retries: self.image_fetch_retries,
            ..HttpConfig::default()
        }
    }

    /// Name of the first missing Notion variable, if any
    pub fn missing_notion_setting(&self) -> Option<&'static str> {
        if self.notion_token.is_none() {
            Some("NOTION_TOKEN")
        } else if self.notion_database_id.is_none() {
            Some("NOTION_DATABASE_ID")
        } else {
            None
        }
    }
}
