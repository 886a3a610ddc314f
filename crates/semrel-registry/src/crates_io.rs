//! Crates.io (and compatible) registry integration
//!
//! Version lookups go through the sparse index, which is what cargo itself
//! resolves dependencies against, so a version visible here is a version a
//! dependent crate can be published against. Publishing is delegated to
//! [`CargoPublisher`].
//!
//! ## Usage
//!
//! ```ignore
//! use semrel_registry::{CratesIoConfig, CratesIoRegistry, Registry};
//!
//! let registry = CratesIoRegistry::new(CratesIoConfig::default())?;
//! let visible = registry.version_exists("serde", "1.0.0").await?;
//! ```

use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cargo::CargoPublisher;
use crate::error::{RegistryError, Result};
use crate::traits::Registry;
use crate::types::{PublishRequest, CRATES_IO};

const DEFAULT_INDEX_URL: &str = "https://index.crates.io";
const DEFAULT_WEB_URL: &str = "https://crates.io";

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CratesIoConfig {
    /// Alternate registry name (`None` = crates.io)
    pub registry: Option<String>,

    /// Sparse index URL, with or without the `sparse+` prefix
    pub index_url: String,

    /// Website used for crate links; only known for crates.io
    pub web_url: Option<String>,

    /// Timeout for a single index request, in seconds
    pub request_timeout_secs: u64,

    /// Token for publishing
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

impl Default for CratesIoConfig {
    fn default() -> Self {
        Self {
            registry: None,
            index_url: DEFAULT_INDEX_URL.to_string(),
            web_url: Some(DEFAULT_WEB_URL.to_string()),
            request_timeout_secs: 30,
            token: None,
        }
    }
}

/// One line of a sparse index file
#[derive(Debug, Clone, Deserialize)]
pub struct IndexEntry {
    /// Crate name as published
    pub name: String,
    /// Version
    pub vers: String,
    /// Whether the version was yanked
    #[serde(default)]
    pub yanked: bool,
}

/// Sparse-index backed registry
#[derive(Debug)]
pub struct CratesIoRegistry {
    config: CratesIoConfig,
    index_base: String,
    client: Client,
    publisher: CargoPublisher,
}

impl CratesIoRegistry {
    /// Create a new registry adapter
    pub fn new(config: CratesIoConfig) -> Result<Self> {
        let index_base = config
            .index_url
            .trim_start_matches("sparse+")
            .trim_end_matches('/')
            .to_string();

        url::Url::parse(&index_base).map_err(|e| {
            RegistryError::ConfigurationError(format!(
                "invalid index URL '{}': {}",
                config.index_url, e
            ))
        })?;

        let client = Client::builder()
            .user_agent(concat!("semrel-cargo/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let publisher = CargoPublisher::new()
            .with_registry(config.registry.clone())
            .with_token(config.token.clone());

        Ok(Self {
            config,
            index_base,
            client,
            publisher,
        })
    }

    /// Replace the cargo runner
    pub fn with_publisher(mut self, publisher: CargoPublisher) -> Self {
        self.publisher = publisher;
        self
    }

    /// Check if a token is configured
    pub fn is_authenticated(&self) -> bool {
        self.config.token.is_some()
    }

    /// Full index URL for a crate
    pub fn index_file_url(&self, name: &str) -> String {
        format!("{}/{}", self.index_base, index_path(name))
    }

    /// Fetch all index entries for a crate; `None` when the crate is unknown
    pub async fn fetch_index(&self, name: &str) -> Result<Option<Vec<IndexEntry>>> {
        let url = self.index_file_url(name);
        debug!(crate_name = name, url = %url, "querying sparse index");

        let response = self
            .client
            .get(&url)
            .header(header::CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Ok(None);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(RegistryError::RateLimited { retry_after });
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message = response.text().await.unwrap_or_default();
            return Err(RegistryError::AuthenticationFailed(message));
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RegistryError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        Ok(Some(parse_index(&body)?))
    }
}

#[async_trait::async_trait]
impl Registry for CratesIoRegistry {
    fn name(&self) -> &str {
        self.config.registry.as_deref().unwrap_or(CRATES_IO)
    }

    async fn version_exists(&self, name: &str, version: &str) -> Result<bool> {
        let exists = match self.fetch_index(name).await? {
            Some(entries) => entries.iter().any(|e| e.vers == version),
            None => false,
        };
        debug!(crate_name = name, version, exists, "index lookup complete");
        Ok(exists)
    }

    async fn publish(&self, request: &PublishRequest) -> Result<()> {
        self.publisher.publish(request).await?;
        info!(crate_name = %request.name, version = %request.version, registry = self.name(), "crate uploaded");
        Ok(())
    }

    fn crate_url(&self, name: &str) -> Option<String> {
        self.config
            .web_url
            .as_ref()
            .map(|base| format!("{}/crates/{}", base.trim_end_matches('/'), name))
    }
}

/// Relative path of a crate's file in a Cargo index
///
/// Names are lowercased; one- and two-letter names live under `1/` and
/// `2/`, three-letter names under `3/<first letter>/`, everything else
/// under `<first two>/<next two>/`.
pub fn index_path(name: &str) -> String {
    let name = name.to_lowercase();
    let chars: Vec<char> = name.chars().collect();
    let part = |range: std::ops::Range<usize>| chars[range].iter().collect::<String>();

    match chars.len() {
        0 | 1 => format!("1/{}", name),
        2 => format!("2/{}", name),
        3 => format!("3/{}/{}", part(0..1), name),
        _ => format!("{}/{}/{}", part(0..2), part(2..4), name),
    }
}

/// Parse a sparse index file (one JSON document per line)
pub fn parse_index(body: &str) -> Result<Vec<IndexEntry>> {
    body.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(RegistryError::from))
        .collect()
}
