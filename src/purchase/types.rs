//! Purchase data carried between the orchestrator, the backend and the journal.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::chain::UnsignedTransfer;
use crate::types::{parse_decimal, Address};

/// Server-issued description of the deposit expected for one purchase attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseIntent {
    pub iro_id: String,
    pub deposit_address: Address,
    /// Amount to transfer, in SOL
    pub amount_sol: f64,
    /// Decimal string of tokens the purchase should credit
    pub estimated_tokens: String,
}

impl PurchaseIntent {
    pub fn estimated_tokens(&self) -> f64 {
        parse_decimal(&self.estimated_tokens).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntentRequest {
    pub amount: f64,
}

/// Body of the purchase confirmation call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub signature: String,
    pub amount: f64,
    pub user_wallet_address: Address,
}

/// Result of wallet signing: the base58 signature and the signing wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedSubmission {
    pub signature: String,
    pub wallet_address: Address,
}

/// Backend verdict on a confirmed purchase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResult {
    pub status: String,
    #[serde(alias = "tokens", default)]
    pub tokens_credited: f64,
}

/// Everything produced by a successful purchase.
#[derive(Debug, Clone)]
pub struct PurchaseOutcome {
    pub idempotency_key: IdempotencyKey,
    pub intent: PurchaseIntent,
    pub transfer: UnsignedTransfer,
    pub submission: SignedSubmission,
    pub result: PurchaseResult,
}

/// Client-generated token tying intent creation and confirmation together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    const LEN: usize = 32;

    pub fn generate() -> Self {
        let key: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(Self::LEN)
            .map(char::from)
            .collect();
        Self(key)
    }

    pub fn from_existing(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
