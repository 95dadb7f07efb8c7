//! Endpoint resolution with ordered failover
//!
//! A run needs exactly one live endpoint. Candidates are the user's custom
//! URL (if any) followed by the network's public list; each candidate gets a
//! single `getBlockHeight` probe and the first one that answers is used for
//! the whole run. Dead candidates are not retried within a run.
//!
//! The selection policy is a `ResolutionStrategy`, so a latency-based or
//! weighted policy can replace `OrderedFailover` without touching the
//! transaction code.
use async_trait::async_trait;
use solana_sdk::commitment_config::CommitmentConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument};

use super::{LedgerRpc, RpcConfig, RpcConnector, RpcManagerError};
use crate::metrics::metrics;
use crate::observability::RunLog;
use crate::types::Network;

/// Live RPC handle owned by one run
#[derive(Clone)]
pub struct ConnectionEndpoint {
    pub url: String,
    pub network: Network,
    pub commitment: CommitmentConfig,
    pub rpc: Arc<dyn LedgerRpc>,
}

impl std::fmt::Debug for ConnectionEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionEndpoint")
            .field("url", &self.url)
            .field("network", &self.network)
            .field("commitment", &self.commitment.commitment)
            .finish_non_exhaustive()
    }
}

/// Result of probing one candidate
pub struct ProbeOutcome {
    pub url: String,
    pub latency: Duration,
    pub result: Result<(Arc<dyn LedgerRpc>, u64), RpcManagerError>,
}

impl ProbeOutcome {
    pub fn is_live(&self) -> bool {
        self.result.is_ok()
    }
}

/// Opens a connection to a candidate and checks that it answers
#[derive(Clone)]
pub struct EndpointProber {
    connector: Arc<dyn RpcConnector>,
    commitment: CommitmentConfig,
    timeout: Duration,
}

impl EndpointProber {
    pub fn new(
        connector: Arc<dyn RpcConnector>,
        commitment: CommitmentConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            connector,
            commitment,
            timeout,
        }
    }

    /// One `getBlockHeight` call bounded by the probe timeout
    pub async fn probe(&self, url: &str) -> ProbeOutcome {
        let started = Instant::now();
        let rpc = self.connector.connect(url, self.commitment);

        let result = match tokio::time::timeout(self.timeout, rpc.get_block_height()).await {
            Ok(Ok(height)) => Ok((rpc, height)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(RpcManagerError::Timeout {
                endpoint: url.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        };

        let outcome = if result.is_ok() { "live" } else { "dead" };
        metrics().endpoint_probes.with_label_values(&[outcome]).inc();

        ProbeOutcome {
            url: url.to_string(),
            latency: started.elapsed(),
            result,
        }
    }
}

/// Policy for picking the run's endpoint among candidates
#[async_trait]
pub trait ResolutionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Return the selected URL and its live handle
    async fn select(
        &self,
        candidates: &[String],
        prober: &EndpointProber,
        log: &mut RunLog,
    ) -> Result<(String, Arc<dyn LedgerRpc>), RpcManagerError>;
}

/// Probe candidates in order; the first one that answers wins
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderedFailover;

#[async_trait]
impl ResolutionStrategy for OrderedFailover {
    fn name(&self) -> &'static str {
        "ordered-failover"
    }

    async fn select(
        &self,
        candidates: &[String],
        prober: &EndpointProber,
        log: &mut RunLog,
    ) -> Result<(String, Arc<dyn LedgerRpc>), RpcManagerError> {
        let mut attempted = Vec::with_capacity(candidates.len());

        for (position, url) in candidates.iter().enumerate() {
            attempted.push(url.clone());
            let outcome = prober.probe(url).await;
            let latency_ms = outcome.latency.as_millis() as u64;

            match outcome.result {
                Ok((rpc, height)) => {
                    log.logger()
                        .log_endpoint_probe(url, true, latency_ms, Some(height));
                    log.info(format!(
                        "Endpoint {}/{} {} is live (block height {}, {} ms)",
                        position + 1,
                        candidates.len(),
                        url,
                        height,
                        latency_ms
                    ));
                    return Ok((url.clone(), rpc));
                }
                Err(e) => {
                    log.logger().log_endpoint_probe(url, false, latency_ms, None);
                    log.warn(format!(
                        "Endpoint {}/{} {} failed: {}",
                        position + 1,
                        candidates.len(),
                        url,
                        e
                    ));
                }
            }
        }

        Err(RpcManagerError::NoEndpointAvailable { attempted })
    }
}

/// Finds a live endpoint for a run
pub struct EndpointResolver {
    config: RpcConfig,
    prober: EndpointProber,
    strategy: Box<dyn ResolutionStrategy>,
}

impl EndpointResolver {
    /// Resolver with the default ordered-failover policy
    pub fn new(config: RpcConfig, connector: Arc<dyn RpcConnector>) -> Self {
        Self::with_strategy(config, connector, Box::new(OrderedFailover))
    }

    pub fn with_strategy(
        config: RpcConfig,
        connector: Arc<dyn RpcConnector>,
        strategy: Box<dyn ResolutionStrategy>,
    ) -> Self {
        let prober = EndpointProber::new(
            connector,
            CommitmentConfig::confirmed(),
            config.probe_timeout(),
        );
        Self {
            config,
            prober,
            strategy,
        }
    }

    /// Custom URL first, then the network's public list; duplicates dropped
    pub fn candidates(&self, custom_url: Option<&str>, network: Network) -> Vec<String> {
        let mut candidates: Vec<String> = Vec::new();
        let custom = custom_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string);

        for url in custom.into_iter().chain(self.config.public_endpoints(network)) {
            if !candidates.contains(&url) {
                candidates.push(url);
            }
        }
        candidates
    }

    /// Resolve a live endpoint pinned to `confirmed` commitment
    #[instrument(skip_all, fields(network = %network, strategy = self.strategy.name()))]
    pub async fn resolve(
        &self,
        custom_url: Option<&str>,
        network: Network,
        log: &mut RunLog,
    ) -> Result<ConnectionEndpoint, RpcManagerError> {
        let candidates = self.candidates(custom_url, network);
        log.info(format!(
            "Resolving {} endpoint among {} candidate(s)",
            network,
            candidates.len()
        ));

        let (url, rpc) = self.strategy.select(&candidates, &self.prober, log).await?;
        info!(url = %url, "Endpoint selected");

        Ok(ConnectionEndpoint {
            url,
            network,
            commitment: CommitmentConfig::confirmed(),
            rpc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockConnector, MockLedgerRpc};

    fn resolver_with(connector: Arc<MockConnector>, config: RpcConfig) -> EndpointResolver {
        EndpointResolver::new(config, connector)
    }

    fn local_config(urls: &[&str]) -> RpcConfig {
        RpcConfig {
            devnet_endpoints: urls.iter().map(|u| u.to_string()).collect(),
            probe_timeout_ms: 200,
            ..RpcConfig::default()
        }
    }

    #[test]
    fn test_candidates_custom_first_without_duplicates() {
        let connector = Arc::new(MockConnector::new());
        let resolver = resolver_with(connector, local_config(&["http://a", "http://b"]));

        assert_eq!(
            resolver.candidates(Some("http://custom"), Network::Devnet),
            vec!["http://custom", "http://a", "http://b"]
        );
        assert_eq!(
            resolver.candidates(Some("http://b"), Network::Devnet),
            vec!["http://b", "http://a"]
        );
        assert_eq!(
            resolver.candidates(Some("   "), Network::Devnet),
            vec!["http://a", "http://b"]
        );
    }

    #[tokio::test]
    async fn test_first_m_fail_then_m_plus_one_selected() {
        let urls = ["http://a", "http://b", "http://c", "http://d"];
        let connector = Arc::new(MockConnector::new());
        connector.register("http://a", MockLedgerRpc::new("http://a").with_dead_probe());
        connector.register("http://b", MockLedgerRpc::new("http://b").with_dead_probe());
        connector.register("http://c", MockLedgerRpc::new("http://c"));
        connector.register("http://d", MockLedgerRpc::new("http://d"));

        let resolver = resolver_with(connector.clone(), local_config(&urls));
        let mut log = RunLog::new(None);
        let endpoint = resolver.resolve(None, Network::Devnet, &mut log).await.unwrap();

        assert_eq!(endpoint.url, "http://c");
        assert_eq!(endpoint.commitment, CommitmentConfig::confirmed());
        assert_eq!(connector.probe_count(), 3);
        assert_eq!(connector.connected_urls(), vec!["http://a", "http://b", "http://c"]);
        // 1 header + 3 attempts
        assert_eq!(log.lines().len(), 4);
    }

    #[tokio::test]
    async fn test_probe_outcome_reports_liveness() {
        let connector = Arc::new(MockConnector::new());
        connector.register("http://dead", MockLedgerRpc::new("http://dead").with_dead_probe());
        let prober = EndpointProber::new(
            connector.clone(),
            CommitmentConfig::confirmed(),
            Duration::from_millis(200),
        );

        let dead = prober.probe("http://dead").await;
        assert!(!dead.is_live());
        assert_eq!(dead.url, "http://dead");

        let live = prober.probe("http://live").await;
        assert!(live.is_live());
        assert_eq!(connector.connected_urls(), vec!["http://dead", "http://live"]);
    }

    #[tokio::test]
    async fn test_custom_url_wins_when_live() {
        let connector = Arc::new(MockConnector::new());
        let resolver = resolver_with(connector.clone(), local_config(&["http://a"]));
        let mut log = RunLog::new(None);

        let endpoint = resolver
            .resolve(Some("http://custom"), Network::Devnet, &mut log)
            .await
            .unwrap();
        assert_eq!(endpoint.url, "http://custom");
        assert_eq!(connector.probe_count(), 1);
    }

    #[tokio::test]
    async fn test_all_candidates_dead() {
        let connector = Arc::new(MockConnector::new());
        connector.register("http://a", MockLedgerRpc::new("http://a").with_dead_probe());
        connector.register("http://b", MockLedgerRpc::new("http://b").with_dead_probe());

        let resolver = resolver_with(connector.clone(), local_config(&["http://a", "http://b"]));
        let mut log = RunLog::new(None);
        let err = resolver.resolve(None, Network::Devnet, &mut log).await.unwrap_err();

        assert_eq!(
            err,
            RpcManagerError::NoEndpointAvailable {
                attempted: vec!["http://a".to_string(), "http://b".to_string()]
            }
        );
        assert_eq!(connector.probe_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_probe_times_out() {
        let connector = Arc::new(MockConnector::new());
        connector.register(
            "http://slow",
            MockLedgerRpc::new("http://slow").with_probe_delay(Duration::from_secs(60)),
        );
        connector.register("http://fast", MockLedgerRpc::new("http://fast"));

        let resolver =
            resolver_with(connector.clone(), local_config(&["http://slow", "http://fast"]));
        let mut log = RunLog::new(None);
        let endpoint = resolver.resolve(None, Network::Devnet, &mut log).await.unwrap();

        assert_eq!(endpoint.url, "http://fast");
        assert!(log.lines()[1].message.contains("Timeout"));
    }
}
