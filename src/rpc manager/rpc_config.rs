use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::Network;

/// RPC settings shared by every run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Per-request timeout of the RPC client in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Upper bound for one liveness probe in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Replaces the built-in devnet endpoint list when non-empty
    #[serde(default)]
    pub devnet_endpoints: Vec<String>,

    /// Replaces the built-in mainnet-beta endpoint list when non-empty
    #[serde(default)]
    pub mainnet_endpoints: Vec<String>,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_probe_timeout_ms() -> u64 {
    10_000
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            probe_timeout_ms: default_probe_timeout_ms(),
            devnet_endpoints: Vec::new(),
            mainnet_endpoints: Vec::new(),
        }
    }
}

impl RpcConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Public endpoints for a network, in priority order
    pub fn public_endpoints(&self, network: Network) -> Vec<String> {
        let overrides = match network {
            Network::Devnet => &self.devnet_endpoints,
            Network::MainnetBeta => &self.mainnet_endpoints,
        };
        if overrides.is_empty() {
            network
                .public_rpc_urls()
                .iter()
                .map(|url| url.to_string())
                .collect()
        } else {
            overrides.clone()
        }
    }
}
