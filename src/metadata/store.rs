//! HTTP metadata store
//!
//! Two requests per token against a configured upload service:
//! `POST {base}/images` with the base64 icon, then `POST {base}/metadata`
//! with the JSON document. Both answer `{ "url": "..." }`.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::{
    check_uri_length, MetadataStore, MetadataStoreError, OffChainMetadata, UploadReceipt,
    UploadStage,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataStoreConfig {
    /// Base URL of the upload service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sent as a bearer token when set
    #[serde(default)]
    pub api_token: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8787".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for MetadataStoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Serialize)]
struct ImageUpload<'a> {
    file_name: &'a str,
    content_type: &'a str,
    data: String,
}

#[derive(Deserialize)]
struct StoredObject {
    url: String,
}

pub struct HttpMetadataStore {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl std::fmt::Debug for HttpMetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMetadataStore")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.api_token.is_some())
            .finish()
    }
}

impl HttpMetadataStore {
    pub fn new(config: &MetadataStoreConfig) -> Result<Self, MetadataStoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MetadataStoreError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone().filter(|token| !token.is_empty()),
        })
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        stage: UploadStage,
        path: &str,
        body: &T,
    ) -> Result<String, MetadataStoreError> {
        let url = format!("{}/{}", self.base_url, path);
        let mut request = self.client.post(&url).json(body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| MetadataStoreError::Http {
            stage,
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MetadataStoreError::Status {
                stage,
                status: status.as_u16(),
                body,
            });
        }

        let stored: StoredObject =
            response
                .json()
                .await
                .map_err(|e| MetadataStoreError::InvalidResponse {
                    stage,
                    reason: e.to_string(),
                })?;

        if stored.url.trim().is_empty() {
            return Err(MetadataStoreError::InvalidResponse {
                stage,
                reason: "empty url".to_string(),
            });
        }
        debug!(stage = %stage, url = %stored.url, "Object stored");
        Ok(stored.url)
    }
}

#[async_trait]
impl MetadataStore for HttpMetadataStore {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn upload(
        &self,
        metadata: &OffChainMetadata,
    ) -> Result<UploadReceipt, MetadataStoreError> {
        let image = ImageUpload {
            file_name: &metadata.icon.file_name,
            content_type: &metadata.icon.content_type,
            data: STANDARD.encode(&metadata.icon.bytes),
        };
        let image_url = self.post(UploadStage::Image, "images", &image).await?;

        let document = metadata.document(&image_url);
        let url = self.post(UploadStage::Document, "metadata", &document).await?;
        check_uri_length(&url)?;

        info!(url = %url, image_url = %image_url, "Metadata published");
        Ok(UploadReceipt { url, image_url })
    }
}
