//! Solana RPC queries needed by the purchase flow.

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{ClientError, Result};

/// Blockhash plus the last block height at which it stays valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestBlockhash {
    pub blockhash: String,
    pub last_valid_block_height: u64,
}

#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn balance_lamports(&self, address: &str) -> Result<u64>;

    async fn latest_blockhash(&self) -> Result<LatestBlockhash>;
}

/// [`ChainRpc`] over the nonblocking Solana RPC client at `confirmed` commitment.
pub struct SolanaRpc {
    client: Arc<RpcClient>,
}

impl SolanaRpc {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        let client = RpcClient::new_with_commitment(rpc_url.into(), CommitmentConfig::confirmed());
        Self {
            client: Arc::new(client),
        }
    }

    pub fn from_client(client: Arc<RpcClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> Arc<RpcClient> {
        self.client.clone()
    }
}

#[async_trait]
impl ChainRpc for SolanaRpc {
    #[instrument(skip(self))]
    async fn balance_lamports(&self, address: &str) -> Result<u64> {
        let pubkey = Pubkey::from_str(address)
            .map_err(|e| ClientError::InvalidAddress(format!("{address}: {e}")))?;
        let balance = self
            .client
            .get_balance(&pubkey)
            .await
            .map_err(|e| ClientError::Rpc(format!("failed to fetch balance: {e}")))?;
        debug!("Balance for {}: {} lamports", address, balance);
        Ok(balance)
    }

    #[instrument(skip(self))]
    async fn latest_blockhash(&self) -> Result<LatestBlockhash> {
        let (hash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(CommitmentConfig::confirmed())
            .await
            .map_err(|e| ClientError::Rpc(format!("failed to get latest blockhash: {e}")))?;
        Ok(LatestBlockhash {
            blockhash: hash.to_string(),
            last_valid_block_height,
        })
    }
}
