//! Fetch recommendations from the configured endpoint

use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

use crate::config::RecommendationsConfig;
use crate::error::{ConfigError, Result};
use crate::recommendations::{recommendations_from_value, Recommendation};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Anything that can produce a batch of recommendations
#[async_trait]
pub trait RecommendationSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Recommendation>>;
}

pub struct RecommendationsFetcher {
    http: reqwest::Client,
    endpoint: String,
}

impl RecommendationsFetcher {
    /// `verify_ssl = false` accepts self-signed certificates
    pub fn new(endpoint: &str, verify_ssl: bool) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .danger_accept_invalid_certs(!verify_ssl)
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.trim().to_string(),
        })
    }

    pub fn from_config(config: &RecommendationsConfig) -> Result<Self> {
        let endpoint = config
            .endpoint_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingField("recommendations.endpoint_url".to_string()))?;
        Self::new(endpoint, config.verify_ssl)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RecommendationSource for RecommendationsFetcher {
    async fn fetch(&self) -> Result<Vec<Recommendation>> {
        info!("Fetching recommendations from {}", self.endpoint);

        let value: serde_json::Value = self
            .http
            .get(&self.endpoint)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let items = recommendations_from_value(value);
        info!("Fetched {} recommendations", items.len());
        Ok(items)
    }
}
