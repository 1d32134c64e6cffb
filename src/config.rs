//! Client configuration and builder.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Conservative lamport buffer reserved for the network fee.
pub const DEFAULT_FEE_BUFFER_LAMPORTS: u64 = 5_000;

/// Target Solana cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cluster {
    Mainnet,
    Devnet,
}

impl Cluster {
    /// Release builds target mainnet, everything else devnet.
    pub fn from_build_profile() -> Self {
        if cfg!(debug_assertions) {
            Cluster::Devnet
        } else {
            Cluster::Mainnet
        }
    }

    /// Chain identifier handed to the wallet signer.
    pub fn chain_id(&self) -> &'static str {
        match self {
            Cluster::Mainnet => "solana:mainnet",
            Cluster::Devnet => "solana:devnet",
        }
    }

    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Cluster::Mainnet => "https://api.mainnet-beta.solana.com",
            Cluster::Devnet => "https://api.devnet.solana.com",
        }
    }
}

impl std::str::FromStr for Cluster {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "mainnet-beta" => Ok(Cluster::Mainnet),
            "devnet" => Ok(Cluster::Devnet),
            other => Err(format!("unknown cluster: {other}")),
        }
    }
}

/// Configuration shared by every client component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL, including the `/api` prefix
    pub api_url: String,
    pub cluster: Cluster,
    /// RPC endpoint; derived from the cluster when unset
    pub rpc_url: Option<String>,
    /// Lamports reserved on top of the purchase amount
    pub fee_buffer_lamports: u64,
    /// SQLite file backing the confirmation journal
    pub journal_path: String,
    /// Attempts when re-sending a confirmation for a known signature
    pub confirm_retry_attempts: usize,
    pub confirm_retry_base_ms: u64,
    /// TTL for cached IRO, investment and balance views
    pub cache_ttl_seconds: u64,
    pub max_cache_entries: u64,
    pub request_timeout_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000/api".to_string(),
            cluster: Cluster::from_build_profile(),
            rpc_url: None,
            fee_buffer_lamports: DEFAULT_FEE_BUFFER_LAMPORTS,
            journal_path: "./iro-journal.db".to_string(),
            confirm_retry_attempts: 4,
            confirm_retry_base_ms: 500,
            cache_ttl_seconds: 30,
            max_cache_entries: 1_000,
            request_timeout_seconds: 30,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `IRO_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("IRO_API_URL") {
            config.api_url = url;
        }
        if let Ok(url) = std::env::var("IRO_RPC_URL") {
            config.rpc_url = Some(url);
        }
        if let Ok(cluster) = std::env::var("IRO_CLUSTER") {
            match cluster.parse() {
                Ok(cluster) => config.cluster = cluster,
                Err(e) => warn!("Ignoring IRO_CLUSTER: {}", e),
            }
        }
        if let Ok(buffer) = std::env::var("IRO_FEE_BUFFER_LAMPORTS") {
            match buffer.parse() {
                Ok(buffer) => config.fee_buffer_lamports = buffer,
                Err(e) => warn!("Ignoring IRO_FEE_BUFFER_LAMPORTS: {}", e),
            }
        }
        if let Ok(path) = std::env::var("IRO_JOURNAL_PATH") {
            config.journal_path = path;
        }
        config
    }

    pub fn rpc_url(&self) -> String {
        self.rpc_url
            .clone()
            .unwrap_or_else(|| self.cluster.default_rpc_url().to_string())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Builder for [`ClientConfig`] with sensible defaults.
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Start from the environment instead of plain defaults.
    pub fn from_env() -> Self {
        Self {
            config: ClientConfig::from_env(),
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    pub fn with_cluster(mut self, cluster: Cluster) -> Self {
        self.config.cluster = cluster;
        self
    }

    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.config.rpc_url = Some(url.into());
        self
    }

    pub fn with_fee_buffer(mut self, lamports: u64) -> Self {
        self.config.fee_buffer_lamports = lamports;
        self
    }

    pub fn with_journal_path(mut self, path: impl Into<String>) -> Self {
        self.config.journal_path = path.into();
        self
    }

    /// Set the confirmation retry policy.
    pub fn with_confirm_retry(mut self, attempts: usize, base_ms: u64) -> Self {
        self.config.confirm_retry_attempts = attempts;
        self.config.confirm_retry_base_ms = base_ms;
        self
    }

    pub fn with_cache_ttl(mut self, ttl_seconds: u64) -> Self {
        self.config.cache_ttl_seconds = ttl_seconds;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
