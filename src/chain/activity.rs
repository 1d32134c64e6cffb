//! Recent wallet activity with per-transaction SOL deltas.

use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Signature};
use solana_transaction_status::UiTransactionEncoding;
use std::str::FromStr;
use tracing::{debug, instrument, warn};

use crate::error::{ClientError, Result};
use crate::types::lamports_to_sol;

pub const DEFAULT_ACTIVITY_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEntry {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    pub failed: bool,
    /// Net change for the wallet, in SOL
    pub amount_sol: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalletActivity {
    pub transactions: Vec<ActivityEntry>,
    pub income_sol: f64,
    pub spending_sol: f64,
}

impl WalletActivity {
    /// Totals from per-entry lamport deltas.
    pub fn from_deltas(entries: Vec<(ActivityEntry, i128)>) -> Self {
        let mut income: i128 = 0;
        let mut spending: i128 = 0;
        let transactions = entries
            .into_iter()
            .map(|(entry, delta)| {
                if delta > 0 {
                    income += delta;
                } else {
                    spending += -delta;
                }
                entry
            })
            .collect();
        Self {
            transactions,
            income_sol: lamports_to_sol(income as u64),
            spending_sol: lamports_to_sol(spending as u64),
        }
    }
}

/// Lamport change of `wallet` across one transaction, 0 when it is not a party.
pub fn balance_delta(account_keys: &[Pubkey], pre: &[u64], post: &[u64], wallet: &Pubkey) -> i128 {
    let Some(index) = account_keys.iter().position(|key| key == wallet) else {
        return 0;
    };
    let before = pre.get(index).copied().unwrap_or(0) as i128;
    let after = post.get(index).copied().unwrap_or(0) as i128;
    after - before
}

fn signed_sol(delta: i128) -> f64 {
    let magnitude = lamports_to_sol(delta.unsigned_abs() as u64);
    if delta < 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Last `limit` transactions touching `address`.
#[instrument(skip(client))]
pub async fn recent_activity(client: &RpcClient, address: &str, limit: usize) -> Result<WalletActivity> {
    let wallet = Pubkey::from_str(address)
        .map_err(|e| ClientError::InvalidAddress(format!("{address}: {e}")))?;

    let config = GetConfirmedSignaturesForAddress2Config {
        limit: Some(limit),
        commitment: Some(CommitmentConfig::confirmed()),
        ..Default::default()
    };
    let signatures = client
        .get_signatures_for_address_with_config(&wallet, config)
        .await
        .map_err(|e| ClientError::Rpc(format!("failed to fetch signatures: {e}")))?;

    let mut entries = Vec::with_capacity(signatures.len());
    for status in signatures {
        let delta = match transaction_delta(client, &status.signature, &wallet).await {
            Ok(delta) => delta,
            Err(e) => {
                warn!("Skipping balance delta for {}: {}", status.signature, e);
                0
            }
        };
        entries.push((
            ActivityEntry {
                signature: status.signature,
                slot: status.slot,
                block_time: status.block_time,
                failed: status.err.is_some(),
                amount_sol: signed_sol(delta),
            },
            delta,
        ));
    }

    debug!("Fetched {} transactions for {}", entries.len(), address);
    Ok(WalletActivity::from_deltas(entries))
}

async fn transaction_delta(client: &RpcClient, signature: &str, wallet: &Pubkey) -> Result<i128> {
    let signature = Signature::from_str(signature)
        .map_err(|e| ClientError::Rpc(format!("invalid signature {signature}: {e}")))?;
    let config = RpcTransactionConfig {
        encoding: Some(UiTransactionEncoding::Base64),
        commitment: Some(CommitmentConfig::confirmed()),
        max_supported_transaction_version: Some(0),
    };
    let confirmed = client
        .get_transaction_with_config(&signature, config)
        .await
        .map_err(|e| ClientError::Rpc(format!("failed to fetch transaction: {e}")))?;

    let meta = confirmed
        .transaction
        .meta
        .ok_or_else(|| ClientError::Rpc("transaction has no status meta".to_string()))?;
    let transaction = confirmed
        .transaction
        .transaction
        .decode()
        .ok_or_else(|| ClientError::Rpc("could not decode transaction".to_string()))?;

    Ok(balance_delta(
        transaction.message.static_account_keys(),
        &meta.pre_balances,
        &meta.post_balances,
        wallet,
    ))
}
