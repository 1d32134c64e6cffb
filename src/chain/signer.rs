//! Wallet signing capability.
//!
//! The wallet provider signs and broadcasts in one step and hands back the raw
//! signature bytes. [`KeypairWallet`] is a local implementation backed by a
//! keypair file, used by the command line client.

use async_trait::async_trait;
use serde_json::json;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_request::RpcRequest;
use solana_sdk::signature::{read_keypair_file, Keypair, Signature, Signer};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::chain::transaction_builder::{decode_compact_u16, encode_compact_u16, SIGNATURE_LEN};
use crate::error::{ClientError, Result};
use crate::session::WalletHandle;

const PUBKEY_LEN: usize = 32;

/// What the wallet is asked to sign and send.
#[derive(Debug, Clone)]
pub struct SignRequest {
    /// Wire transaction with zeroed signature slots
    pub transaction: Vec<u8>,
    pub wallet: WalletHandle,
    /// `solana:mainnet` or `solana:devnet`
    pub chain: String,
    /// Whether the provider should sponsor fees
    pub sponsor: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOutput {
    pub signature: Vec<u8>,
}

#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Sign and broadcast. Blocks on the provider's own prompt lifecycle.
    async fn sign_and_send(&self, request: SignRequest) -> Result<SignOutput>;
}

/// Base58 form of a signature, as sent to the backend.
pub fn encode_signature(signature: &[u8]) -> String {
    bs58::encode(signature).into_string()
}

/// Signs with a local keypair and submits through RPC.
pub struct KeypairWallet {
    keypair: Keypair,
    client: Arc<RpcClient>,
}

impl KeypairWallet {
    pub fn new(keypair: Keypair, client: Arc<RpcClient>) -> Self {
        Self { keypair, client }
    }

    pub fn from_file(path: &str, client: Arc<RpcClient>) -> Result<Self> {
        let keypair = read_keypair_file(path)
            .map_err(|e| ClientError::Wallet(format!("failed to read keypair {path}: {e}")))?;
        Ok(Self::new(keypair, client))
    }

    pub fn handle(&self) -> WalletHandle {
        WalletHandle::embedded(self.keypair.pubkey().to_string())
    }

    /// Fill the fee payer's signature slot of a wire transaction.
    pub fn sign_wire(&self, wire: &[u8]) -> Result<(Signature, Vec<u8>)> {
        let (num_signatures, prefix_len) = decode_compact_u16(wire)
            .ok_or_else(|| ClientError::Wallet("malformed signature count".to_string()))?;
        if num_signatures == 0 {
            return Err(ClientError::Wallet("transaction requires no signer".to_string()));
        }
        let message_start = prefix_len + num_signatures as usize * SIGNATURE_LEN;
        let message = wire
            .get(message_start..)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| ClientError::Wallet("transaction truncated".to_string()))?;

        let fee_payer = fee_payer_of(message)?;
        if fee_payer != self.keypair.pubkey().to_bytes() {
            return Err(ClientError::Wallet(
                "fee payer does not match the signing wallet".to_string(),
            ));
        }

        let signature = self.keypair.sign_message(message);
        let mut signed = encode_compact_u16(num_signatures);
        signed.extend_from_slice(signature.as_ref());
        signed.extend_from_slice(&wire[prefix_len + SIGNATURE_LEN..]);
        Ok((signature, signed))
    }
}

/// First account key of a legacy message: three header bytes, the key count, then keys.
fn fee_payer_of(message: &[u8]) -> Result<[u8; PUBKEY_LEN]> {
    let keys = message
        .get(3..)
        .and_then(|rest| decode_compact_u16(rest).map(|(count, len)| (count, &rest[len..])));
    match keys {
        Some((count, keys)) if count > 0 && keys.len() >= PUBKEY_LEN => {
            let mut out = [0u8; PUBKEY_LEN];
            out.copy_from_slice(&keys[..PUBKEY_LEN]);
            Ok(out)
        }
        _ => Err(ClientError::Wallet("message has no fee payer".to_string())),
    }
}

#[async_trait]
impl WalletSigner for KeypairWallet {
    #[instrument(skip(self, request), fields(wallet = %request.wallet.address, chain = %request.chain))]
    async fn sign_and_send(&self, request: SignRequest) -> Result<SignOutput> {
        if request.wallet.address != self.keypair.pubkey().to_string() {
            return Err(ClientError::Wallet(format!(
                "wallet {} is not managed by this signer",
                request.wallet.address
            )));
        }
        if request.sponsor {
            warn!("Fee sponsorship is not available for local keypairs; paying fees directly");
        }

        let (signature, signed) = self.sign_wire(&request.transaction)?;
        let params = json!([
            bs58::encode(&signed).into_string(),
            { "encoding": "base58", "preflightCommitment": "confirmed" }
        ]);
        let returned: String = self
            .client
            .send(RpcRequest::SendTransaction, params)
            .await
            .map_err(|e| ClientError::Wallet(format!("failed to send transaction: {e}")))?;

        if returned != signature.to_string() {
            warn!("RPC returned signature {} but signed {}", returned, signature);
        }
        info!("Transaction submitted: {}", signature);
        Ok(SignOutput {
            signature: signature.as_ref().to_vec(),
        })
    }
}
