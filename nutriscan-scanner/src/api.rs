//! Client for the label analysis HTTP API

use crate::config::ScannerConfig;
use crate::error::ScanError;
use async_trait::async_trait;
use nutriscan_core::{AnalysisResult, Analytics, HistoryEntry, ImageBlob, Preferences, Suggestion};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Remote operations the scanner depends on
#[async_trait]
pub trait LabelApi: Send + Sync {
    /// `POST /analyze`
    async fn analyze(&self, ingredients: &ImageBlob, nutrition: Option<&ImageBlob>) -> Result<AnalysisResult, ScanError>;

    /// `GET /search?q=`
    async fn search(&self, query: &str) -> Result<Vec<Suggestion>, ScanError>;

    /// `GET /history`
    async fn history(&self) -> Result<Vec<HistoryEntry>, ScanError>;

    /// `GET /analytics`
    async fn analytics(&self) -> Result<Analytics, ScanError>;

    /// `GET /preferences`
    async fn preferences(&self) -> Result<Preferences, ScanError>;

    /// `POST /preferences`
    async fn save_preferences(&self, preferences: &Preferences) -> Result<(), ScanError>;
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest {
    ingredients_image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    nutrition_image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    products: Vec<Suggestion>,
}

/// `LabelApi` over JSON/HTTP
pub struct HttpLabelApi {
    client: Client,
    base_url: String,
}

impl HttpLabelApi {
    pub fn new(config: &ScannerConfig) -> Result<Self, ScanError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ScanError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Fail on non-2xx, returning the body text
async fn body_text(response: Response) -> Result<String, ScanError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        warn!("Server answered {}: {}", status, text);
        return Err(ScanError::Server {
            status: status.as_u16(),
            message: text,
        });
    }
    Ok(text)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ScanError> {
    let text = body_text(response).await?;
    serde_json::from_str(&text).map_err(|e| ScanError::MalformedResult(e.to_string()))
}

#[async_trait]
impl LabelApi for HttpLabelApi {
    async fn analyze(&self, ingredients: &ImageBlob, nutrition: Option<&ImageBlob>) -> Result<AnalysisResult, ScanError> {
        let payload = AnalyzeRequest {
            ingredients_image: ingredients.to_data_uri(),
            nutrition_image: nutrition.map(ImageBlob::to_data_uri),
        };
        debug!(
            "Submitting analysis ({} + {} bytes)",
            ingredients.len(),
            nutrition.map(ImageBlob::len).unwrap_or(0)
        );
        let response = self.client.post(self.url("/analyze")).json(&payload).send().await?;
        let text = body_text(response).await?;
        AnalysisResult::from_json(&text).map_err(|e| ScanError::MalformedResult(e.to_string()))
    }

    async fn search(&self, query: &str) -> Result<Vec<Suggestion>, ScanError> {
        let response = self
            .client
            .get(self.url("/search"))
            .query(&[("q", query)])
            .send()
            .await?;
        let page: SearchResponse = read_json(response).await?;
        Ok(page.products)
    }

    async fn history(&self) -> Result<Vec<HistoryEntry>, ScanError> {
        let response = self.client.get(self.url("/history")).send().await?;
        read_json(response).await
    }

    async fn analytics(&self) -> Result<Analytics, ScanError> {
        let response = self.client.get(self.url("/analytics")).send().await?;
        read_json(response).await
    }

    async fn preferences(&self) -> Result<Preferences, ScanError> {
        let response = self.client.get(self.url("/preferences")).send().await?;
        read_json(response).await
    }

    async fn save_preferences(&self, preferences: &Preferences) -> Result<(), ScanError> {
        let response = self
            .client
            .post(self.url("/preferences"))
            .json(preferences)
            .send()
            .await?;
        body_text(response).await.map(|_| ())
    }
}
