//! Off-chain token metadata
//!
//! The on-chain metadata account only stores name, symbol and a URI. The
//! URI points at a Metaplex-standard JSON document which in turn references
//! the icon image. Both live in an external store behind `MetadataStore`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CreationRequest, IconImage, MAX_URI_LENGTH};

pub mod store;

pub use store::{HttpMetadataStore, MetadataStoreConfig};

/// Which upload a store error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStage {
    Image,
    Document,
}

impl std::fmt::Display for UploadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadStage::Image => f.write_str("image"),
            UploadStage::Document => f.write_str("document"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetadataStoreError {
    #[error("HTTP error during {stage} upload: {message}")]
    Http { stage: UploadStage, message: String },

    #[error("Store rejected {stage} upload with status {status}: {body}")]
    Status {
        stage: UploadStage,
        status: u16,
        body: String,
    },

    #[error("Invalid {stage} upload response: {reason}")]
    InvalidResponse { stage: UploadStage, reason: String },

    #[error("Metadata URI is {len} bytes, max {max}")]
    UriTooLong { len: usize, max: usize },

    #[error("Metadata store configuration error: {0}")]
    Config(String),
}

impl MetadataStoreError {
    /// Transport failures, 5xx, 408 and 429 can clear up; other rejections repeat
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { .. } => true,
            Self::Status { status, .. } => matches!(status, 408 | 429 | 500..=599),
            Self::InvalidResponse { .. } | Self::UriTooLong { .. } | Self::Config(_) => false,
        }
    }
}

/// Everything needed to publish a token's descriptive metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffChainMetadata {
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub external_url: Option<String>,
    pub icon: IconImage,
}

impl OffChainMetadata {
    pub fn from_request(request: &CreationRequest) -> Self {
        let token = request.token();
        Self {
            name: token.name.clone(),
            symbol: token.symbol.clone(),
            description: token.description.clone(),
            external_url: token.external_url.clone(),
            icon: request.icon().clone(),
        }
    }

    /// JSON document referencing an already uploaded image
    pub fn document(&self, image_url: &str) -> MetadataDocument {
        MetadataDocument {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            description: self.description.clone(),
            image: image_url.to_string(),
            external_url: self.external_url.clone(),
            properties: DocumentProperties {
                files: vec![DocumentFile {
                    uri: image_url.to_string(),
                    content_type: self.icon.content_type.clone(),
                }],
                category: "image".to_string(),
            },
        }
    }
}

/// Metaplex fungible-token JSON standard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    pub properties: DocumentProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentProperties {
    pub files: Vec<DocumentFile>,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFile {
    pub uri: String,
    #[serde(rename = "type")]
    pub content_type: String,
}

/// Where the published document and image ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// URI registered on-chain
    pub url: String,
    pub image_url: String,
}

/// Durable storage for token metadata
#[async_trait]
pub trait MetadataStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Upload the icon, then the JSON document pointing at it
    async fn upload(
        &self,
        metadata: &OffChainMetadata,
    ) -> Result<UploadReceipt, MetadataStoreError>;
}

/// Reject URIs the metadata program would not accept
pub fn check_uri_length(uri: &str) -> Result<(), MetadataStoreError> {
    if uri.len() > MAX_URI_LENGTH {
        return Err(MetadataStoreError::UriTooLong {
            len: uri.len(),
            max: MAX_URI_LENGTH,
        });
    }
    Ok(())
}
