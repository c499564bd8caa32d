use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use crate::config::LookupSettings;
use crate::error::FetchError;
use crate::pipeline::types::{EnrichmentRecord, LookupResponse};

/// Resolves a single code to a record with exactly one outbound request.
/// Implementations never retry; the transport bounds how long a call takes.
#[async_trait]
pub trait EnrichmentFetcher: Send + Sync {
    async fn fetch(&self, code: &str) -> Result<EnrichmentRecord, FetchError>;
}

/// Nutritionix `search/item` lookup by UPC.
#[derive(Debug, Clone)]
pub struct NutritionixFetcher {
    http_client: reqwest::Client,
    base_url: String,
    app_id: String,
    app_key: String,
}

impl NutritionixFetcher {
    pub fn new(settings: &LookupSettings) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;
        Ok(Self::with_http_client(settings, http_client))
    }

    /// Uses a pre-configured client, e.g. one shared with other components.
    pub fn with_http_client(settings: &LookupSettings, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            app_id: settings.app_id.clone(),
            app_key: settings.app_key.clone(),
        }
    }
}

#[async_trait]
impl EnrichmentFetcher for NutritionixFetcher {
    async fn fetch(&self, code: &str) -> Result<EnrichmentRecord, FetchError> {
        let url = format!("{}/search/item", self.base_url);
        debug!(%code, %url, "Looking up code");

        let response = self
            .http_client
            .get(url)
            .query(&[("upc", code)])
            .header("x-app-id", &self.app_id)
            .header("x-app-key", &self.app_key)
            .send()
            .await?;

        // The provider answers unknown UPCs with 404 rather than an empty list.
        if response.status() == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(code.to_string()));
        }

        let body: LookupResponse = response.error_for_status()?.json().await?;
        body.into_first_record(code)
            .ok_or_else(|| FetchError::NotFound(code.to_string()))
    }
}
