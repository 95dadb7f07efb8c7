//! Configuration module for mintforge
//!
//! This module handles configuration loading from TOML files and
//! environment variables, and turns the token section into a `TokenForm`.

use anyhow::{bail, Context};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

use crate::funding::FundingPolicy;
use crate::metadata::MetadataStoreConfig;
use crate::rpc_manager::RpcConfig;
use crate::types::{AuthorityInput, IconImage, TokenForm};

/// Overrides the custom RPC URL
pub const RPC_URL_ENV: &str = "MINTFORGE_RPC_URL";
/// Overrides the metadata store bearer token
pub const STORE_TOKEN_ENV: &str = "MINTFORGE_STORE_TOKEN";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Target cluster and optional custom endpoint
    #[serde(default)]
    pub network: NetworkConfig,

    /// RPC timeouts and public endpoint lists
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Funding estimate parameters
    #[serde(default)]
    pub funding: FundingPolicy,

    /// Off-chain metadata upload service
    #[serde(default)]
    pub metadata_store: MetadataStoreConfig,

    /// Token to create
    pub token: TokenConfig,

    /// What happens to each authority afterwards
    #[serde(default)]
    pub authorities: AuthoritiesConfig,

    /// Monitoring and logging
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// `devnet` or `mainnet-beta`
    #[serde(default = "default_network")]
    pub name: String,

    /// Tried before the public endpoints
    #[serde(default)]
    pub custom_rpc_url: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: default_network(),
            custom_rpc_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenConfig {
    pub name: String,
    pub symbol: String,
    /// Integer or quoted string; kept as text so validation sees it unchanged
    #[serde(deserialize_with = "integer_text")]
    pub supply: String,
    /// Signed so that out-of-range values reach validation
    pub decimals: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub external_url: Option<String>,
    /// Relative paths resolve against the config file's directory
    #[serde(default)]
    pub icon_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthoritiesConfig {
    #[serde(default)]
    pub mint: AuthorityInput,
    #[serde(default)]
    pub freeze: AuthorityInput,
    #[serde(default)]
    pub update: AuthorityInput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Print Prometheus metrics after a run
    #[serde(default)]
    pub print_metrics: bool,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,

    /// Default tracing filter when RUST_LOG is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            print_metrics: false,
            json_logs: false,
            log_filter: default_log_filter(),
        }
    }
}

/// TOML integers stop at i64, so supplies above that are written as strings
#[derive(Deserialize)]
#[serde(untagged)]
enum IntegerText {
    Integer(i64),
    Text(String),
}

fn integer_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match IntegerText::deserialize(deserializer)? {
        IntegerText::Integer(value) => value.to_string(),
        IntegerText::Text(text) => text,
    })
}

// Default value functions
fn default_network() -> String { "devnet".to_string() }
fn default_log_filter() -> String { "mintforge=info".to_string() }

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;

        if let Some(icon) = config.token.icon_path.as_mut() {
            if icon.is_relative() {
                if let Some(dir) = path.parent() {
                    *icon = dir.join(&*icon);
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;

        if let Ok(url) = std::env::var(RPC_URL_ENV) {
            if !url.trim().is_empty() {
                config.network.custom_rpc_url = Some(url);
            }
        }
        if let Ok(token) = std::env::var(STORE_TOKEN_ENV) {
            if !token.trim().is_empty() {
                config.metadata_store.api_token = Some(token);
            }
        }
        Ok(config)
    }

    /// Settings that are wrong regardless of the token being created
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rpc.probe_timeout_ms == 0 {
            bail!("rpc.probe_timeout_ms must be greater than 0");
        }
        if self.rpc.request_timeout_secs == 0 {
            bail!("rpc.request_timeout_secs must be greater than 0");
        }
        if self.metadata_store.base_url.trim().is_empty() {
            bail!("metadata_store.base_url must not be empty");
        }
        Ok(())
    }

    /// Form equivalent of the token and authority sections. Reads the icon file.
    pub fn to_form(&self, payer_key: &str) -> anyhow::Result<TokenForm> {
        let icon = match &self.token.icon_path {
            Some(path) => Some(load_icon(path)?),
            None => None,
        };

        Ok(TokenForm {
            network: self.network.name.clone(),
            custom_rpc_url: self.network.custom_rpc_url.clone().unwrap_or_default(),
            payer_key: payer_key.to_string(),
            name: self.token.name.clone(),
            symbol: self.token.symbol.clone(),
            supply: self.token.supply.clone(),
            decimals: self.token.decimals.to_string(),
            description: self.token.description.clone(),
            external_url: self.token.external_url.clone().unwrap_or_default(),
            icon,
            mint_authority: self.authorities.mint.clone(),
            freeze_authority: self.authorities.freeze.clone(),
            update_authority: self.authorities.update.clone(),
        })
    }
}

/// Read an icon file, guessing its MIME type from the extension
pub fn load_icon(path: &Path) -> anyhow::Result<IconImage> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read icon {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "icon".to_string());
    let content_type = IconImage::content_type_for(&file_name);
    Ok(IconImage::new(file_name, content_type, bytes))
}
