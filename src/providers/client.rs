//! HTTP client for Ergast-compatible APIs

use crate::error::ProviderError;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Jolpica's Ergast-compatible endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.jolpi.ca/ergast/f1";

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL (override in tests)
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            user_agent: format!("race-prophet/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Thin JSON GET client with a bounded timeout
///
/// A failed request surfaces immediately; callers decide whether to skip
/// the event (batch builds) or fail the request (single-event builds).
/// There is deliberately no retry loop here.
pub struct ErgastClient {
    client: reqwest::Client,
    base_url: String,
}

impl ErgastClient {
    pub fn new(config: ClientConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch `{base_url}/{path}` and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await?.error_for_status()?;
        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}
