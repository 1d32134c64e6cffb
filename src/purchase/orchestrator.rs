//! Purchase workflow: validate, check funds, create the intent, build and sign
//! the transfer, then confirm with the backend.
//!
//! Every step runs once and in order. Once the wallet has broadcast, a failed
//! confirmation is reported as [`ClientError::ConfirmationPending`] and the
//! attempt stays in the journal until [`PurchaseOrchestrator::retry_confirmation`]
//! or [`PurchaseOrchestrator::reconcile_pending`] gets it acknowledged.

use std::iter::Take;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::{strategy::ExponentialBackoff, Retry};
use tracing::{debug, info, instrument, warn};

use crate::api::IroBackend;
use crate::cache::ViewCache;
use crate::chain::{
    encode_signature, ChainRpc, SignRequest, UnsignedTransfer, WalletSigner, WalletTransactionBuilder,
};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::in_flight::InFlight;
use crate::purchase::journal::{ConfirmationJournal, JournalEntry, JournalStatus, NewIntent};
use crate::purchase::types::{
    ConfirmRequest, IdempotencyKey, PurchaseIntent, PurchaseOutcome, PurchaseResult,
    SignedSubmission,
};
use crate::session::AuthSession;
use crate::types::{parse_decimal, sol_to_lamports, Iro};

/// Parse user input into a SOL amount at or above `minimum`.
pub fn validate_amount(input: &str, minimum: f64) -> Result<f64> {
    let amount = parse_decimal(input)
        .filter(|a| *a > 0.0)
        .ok_or_else(|| ClientError::Validation("Please enter a valid amount".to_string()))?;
    if amount < minimum {
        return Err(ClientError::BelowMinimum { minimum });
    }
    Ok(amount)
}

/// Reject an intent for another offering or for a different amount than requested.
fn check_intent(iro_id: &str, requested: f64, intent: &PurchaseIntent) -> Result<()> {
    if intent.iro_id != iro_id || sol_to_lamports(intent.amount_sol) != sol_to_lamports(requested) {
        return Err(ClientError::IntentMismatch {
            iro_id: intent.iro_id.clone(),
            requested,
            quoted: intent.amount_sol,
        });
    }
    Ok(())
}

fn owns_wallet(session: &dyn AuthSession, address: &str) -> bool {
    session.wallets().iter().any(|w| w.address == address)
}

/// Local preview of a purchase; no network.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseQuote {
    pub amount_sol: f64,
    pub lamports: u64,
    pub estimated_tokens: f64,
    pub minimum_sol: f64,
}

/// Result of a reconciliation sweep over broadcast-but-unconfirmed purchases.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub confirmed: Vec<String>,
    /// Key and last error of entries that are still unconfirmed
    pub still_pending: Vec<(String, String)>,
    /// Entries belonging to wallets outside the session
    pub skipped: usize,
}

pub struct PurchaseOrchestrator {
    backend: Arc<dyn IroBackend>,
    rpc: Arc<dyn ChainRpc>,
    signer: Arc<dyn WalletSigner>,
    journal: Arc<dyn ConfirmationJournal>,
    cache: ViewCache,
    config: ClientConfig,
    in_flight: InFlight,
}

impl PurchaseOrchestrator {
    pub fn new(
        backend: Arc<dyn IroBackend>,
        rpc: Arc<dyn ChainRpc>,
        signer: Arc<dyn WalletSigner>,
        journal: Arc<dyn ConfirmationJournal>,
        cache: ViewCache,
        config: ClientConfig,
    ) -> Self {
        Self {
            backend,
            rpc,
            signer,
            journal,
            cache,
            config,
            in_flight: InFlight::new(),
        }
    }

    pub fn quote(&self, iro: &Iro, amount_input: &str) -> Result<PurchaseQuote> {
        let minimum_sol = iro.min_purchase_sol();
        let amount_sol = validate_amount(amount_input, minimum_sol)?;
        Ok(PurchaseQuote {
            amount_sol,
            lamports: sol_to_lamports(amount_sol),
            estimated_tokens: iro.estimated_tokens(amount_sol),
            minimum_sol,
        })
    }

    /// Wallet balance in lamports, served from the view cache when fresh.
    pub async fn wallet_balance(&self, address: &str) -> Result<u64> {
        if let Some(lamports) = self.cache.balance(address).await {
            return Ok(lamports);
        }
        let lamports = self.rpc.balance_lamports(address).await?;
        self.cache.store_balance(address, lamports).await;
        Ok(lamports)
    }

    #[instrument(skip(self, iro, session), fields(iro_id = %iro.id))]
    pub async fn purchase(
        &self,
        iro: &Iro,
        amount_input: &str,
        session: &dyn AuthSession,
    ) -> Result<PurchaseOutcome> {
        let token = session
            .access_token()
            .await
            .ok_or(ClientError::NotAuthenticated)?;
        let Some(wallet) = session.wallet() else {
            session.request_wallet_connect();
            return Err(ClientError::WalletNotConnected);
        };
        let amount = validate_amount(amount_input, iro.min_purchase_sol())?;

        let _guard = self.in_flight.acquire(format!("{}:{}", wallet.address, iro.id))?;

        // Always read a fresh balance for the funds check.
        let available = self.rpc.balance_lamports(&wallet.address).await?;
        self.cache.store_balance(&wallet.address, available).await;
        let required = sol_to_lamports(amount).saturating_add(self.config.fee_buffer_lamports);
        if available < required {
            return Err(ClientError::InsufficientFunds {
                required,
                available,
            });
        }

        let key = IdempotencyKey::generate();
        let intent = self
            .backend
            .create_intent(&token, &iro.id, amount, &key)
            .await?;
        check_intent(&iro.id, amount, &intent)?;
        debug!("Intent {} created, deposit to {}", key, intent.deposit_address);

        self.journal
            .record_intent(NewIntent {
                idempotency_key: key.as_str(),
                iro_id: &iro.id,
                wallet_address: &wallet.address,
                deposit_address: &intent.deposit_address,
                amount_sol: amount,
            })
            .await
            .map_err(ClientError::Journal)?;

        let transfer = match self.prepare_transfer(&intent, &wallet.address).await {
            Ok(transfer) => transfer,
            Err(e) => return Err(self.abandon(&key, e).await),
        };

        let request = SignRequest {
            transaction: transfer.wire_bytes(),
            wallet: wallet.clone(),
            chain: self.config.cluster.chain_id().to_string(),
            sponsor: false,
        };
        let output = match self.signer.sign_and_send(request).await {
            Ok(output) => output,
            Err(e) => return Err(self.abandon(&key, e).await),
        };
        let signature = encode_signature(&output.signature);
        info!("Transfer broadcast: {}", signature);

        let journaled = Retry::spawn(self.retry_strategy(), || {
            self.journal.record_broadcast(key.as_str(), &signature)
        })
        .await;
        if let Err(e) = journaled {
            warn!("Failed to journal broadcast {} for {}: {:#}", signature, key, e);
        }

        let confirm = ConfirmRequest {
            signature: signature.clone(),
            amount,
            user_wallet_address: wallet.address.clone(),
        };
        let result = match self
            .backend
            .confirm_purchase(&token, &iro.id, &confirm, &key)
            .await
        {
            Ok(result) => result,
            Err(e) => return Err(self.pending(&key, signature, e).await),
        };

        self.finish(&key, &iro.id, &wallet.address).await;
        info!("Purchase {} confirmed: {}", key, result.status);

        Ok(PurchaseOutcome {
            idempotency_key: key,
            intent,
            transfer,
            submission: SignedSubmission {
                signature,
                wallet_address: wallet.address,
            },
            result,
        })
    }

    /// Re-send confirmation for a journaled broadcast with its stored
    /// signature. Never signs again.
    #[instrument(skip(self, session))]
    pub async fn retry_confirmation(
        &self,
        idempotency_key: &str,
        session: &dyn AuthSession,
    ) -> Result<PurchaseResult> {
        let token = session
            .access_token()
            .await
            .ok_or(ClientError::NotAuthenticated)?;
        let entry = self.owned_entry(idempotency_key, session).await?;
        self.confirm_entry(&token, entry).await
    }

    /// Confirm a purchase whose broadcast signature never reached the journal.
    ///
    /// `signature` is the one reported by [`ClientError::ConfirmationPending`].
    /// A row already holding a different signature is refused.
    #[instrument(skip(self, session))]
    pub async fn retry_confirmation_with_signature(
        &self,
        idempotency_key: &str,
        signature: &str,
        session: &dyn AuthSession,
    ) -> Result<PurchaseResult> {
        let token = session
            .access_token()
            .await
            .ok_or(ClientError::NotAuthenticated)?;
        let mut entry = self.owned_entry(idempotency_key, session).await?;

        let stored = entry.signature.clone();
        match (entry.status, stored.as_deref()) {
            (JournalStatus::IntentCreated, _) | (JournalStatus::Broadcast, None) => {
                if let Err(e) = self.journal.record_broadcast(idempotency_key, signature).await {
                    warn!("Failed to journal broadcast {} for {}: {:#}", signature, idempotency_key, e);
                }
                entry.status = JournalStatus::Broadcast;
                entry.signature = Some(signature.to_string());
            }
            (JournalStatus::Broadcast, Some(stored)) if stored != signature => {
                return Err(ClientError::Validation(format!(
                    "purchase {} was broadcast as {}, not {}",
                    idempotency_key, stored, signature
                )));
            }
            _ => {}
        }
        self.confirm_entry(&token, entry).await
    }

    /// Retry every broadcast-but-unconfirmed purchase made by the session's wallets.
    #[instrument(skip(self, session))]
    pub async fn reconcile_pending(&self, session: &dyn AuthSession) -> Result<ReconcileReport> {
        let token = session
            .access_token()
            .await
            .ok_or(ClientError::NotAuthenticated)?;
        let pending = self
            .journal
            .pending_broadcasts()
            .await
            .map_err(ClientError::Journal)?;

        let mut report = ReconcileReport::default();
        for entry in pending {
            if !owns_wallet(session, &entry.wallet_address) {
                report.skipped += 1;
                continue;
            }
            let key = entry.idempotency_key.clone();
            match self.confirm_entry(&token, entry).await {
                Ok(_) => report.confirmed.push(key),
                Err(e) => report.still_pending.push((key, e.user_message())),
            }
        }
        info!(
            "Reconciled {} purchases, {} still pending",
            report.confirmed.len(),
            report.still_pending.len()
        );
        Ok(report)
    }

    async fn prepare_transfer(&self, intent: &PurchaseIntent, fee_payer: &str) -> Result<UnsignedTransfer> {
        let blockhash = self.rpc.latest_blockhash().await?;
        WalletTransactionBuilder::build_for_intent(intent, fee_payer, &blockhash)
    }

    /// Journal entry for `idempotency_key`, provided one of the session's wallets made it.
    async fn owned_entry(&self, idempotency_key: &str, session: &dyn AuthSession) -> Result<JournalEntry> {
        let entry = self
            .journal
            .get(idempotency_key)
            .await
            .map_err(ClientError::Journal)?
            .ok_or_else(|| {
                ClientError::Validation(format!("no journaled purchase for key {}", idempotency_key))
            })?;
        if !owns_wallet(session, &entry.wallet_address) {
            return Err(ClientError::Validation(format!(
                "purchase {} was made by a wallet outside this session",
                idempotency_key
            )));
        }
        Ok(entry)
    }

    async fn confirm_entry(&self, token: &str, entry: JournalEntry) -> Result<PurchaseResult> {
        let key = IdempotencyKey::from_existing(entry.idempotency_key.clone());
        if entry.status != JournalStatus::Broadcast {
            return Err(ClientError::Validation(format!(
                "purchase {} is {}, nothing to confirm",
                key,
                entry.status.as_str()
            )));
        }
        let signature = entry.signature.clone().ok_or_else(|| {
            ClientError::Validation(format!("purchase {} has no broadcast signature", key))
        })?;

        let request = ConfirmRequest {
            signature: signature.clone(),
            amount: entry.amount_sol,
            user_wallet_address: entry.wallet_address.clone(),
        };
        let result = Retry::spawn(self.retry_strategy(), || {
            self.backend
                .confirm_purchase(token, &entry.iro_id, &request, &key)
        })
        .await;

        match result {
            Ok(result) => {
                self.finish(&key, &entry.iro_id, &entry.wallet_address).await;
                info!("Purchase {} confirmed on retry with {}", key, signature);
                Ok(result)
            }
            Err(e) => Err(self.pending(&key, signature, e).await),
        }
    }

    fn retry_strategy(&self) -> Take<ExponentialBackoff> {
        ExponentialBackoff::from_millis(self.config.confirm_retry_base_ms)
            .max_delay(Duration::from_secs(5))
            .take(self.config.confirm_retry_attempts)
    }

    /// Terminal failure before anything was broadcast.
    async fn abandon(&self, key: &IdempotencyKey, error: ClientError) -> ClientError {
        if let Err(journal_err) = self.journal.mark_failed(key.as_str(), &error.to_string()).await {
            warn!("Failed to journal failure for {}: {:#}", key, journal_err);
        }
        error
    }

    async fn finish(&self, key: &IdempotencyKey, iro_id: &str, wallet: &str) {
        if let Err(e) = self.journal.mark_confirmed(key.as_str()).await {
            warn!("Failed to mark {} confirmed: {:#}", key, e);
        }
        self.cache.invalidate_after_purchase(iro_id, wallet).await;
    }

    async fn pending(&self, key: &IdempotencyKey, signature: String, source: ClientError) -> ClientError {
        warn!("Confirmation for {} failed after broadcast: {}", signature, source);
        if let Err(e) = self.journal.note_error(key.as_str(), &source.user_message()).await {
            warn!("Failed to journal confirmation error for {}: {:#}", key, e);
        }
        ClientError::ConfirmationPending {
            idempotency_key: key.to_string(),
            signature,
            source: Box::new(source),
        }
    }
}
