//! In-memory stand-ins for the backend, RPC and wallet.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use iro_client::api::{IroBackend, ListParams};
use iro_client::onboarding::CreatorApplicationRequest;
use iro_client::cache::ViewCache;
use iro_client::chain::{ChainRpc, LatestBlockhash, SignOutput, SignRequest, WalletSigner};
use iro_client::config::{ClientBuilder, Cluster};
use iro_client::error::{ClientError, Result};
use iro_client::purchase::{
    ConfirmRequest, ConfirmationJournal, IdempotencyKey, JournalEntry, NewIntent, PurchaseIntent,
    PurchaseOrchestrator, PurchaseResult, SqliteJournal,
};
use iro_client::session::{StaticSession, WalletHandle};
use iro_client::types::{
    ApplicationPage, CreatorApplication, Iro, IroPage, IroParticipant, PageMeta, PortfolioItem,
};
use iro_client::vesting::{ClaimResult, VestingRecord, VestingToken};

pub const TOKEN: &str = "test-token";
pub const SIGNATURE_BYTE: u8 = 9;

pub fn wallet_address() -> String {
    Pubkey::new_from_array([1u8; 32]).to_string()
}

pub fn deposit_address() -> String {
    Pubkey::new_from_array([2u8; 32]).to_string()
}

pub fn signed_session() -> StaticSession {
    StaticSession::new(
        Some(TOKEN.to_string()),
        vec![WalletHandle::embedded(wallet_address())],
    )
}

pub fn sample_iro(min_purchase: Option<&str>) -> Iro {
    serde_json::from_value(json!({
        "id": "iro-1",
        "tokenId": "tok-1",
        "startTime": "2026-01-01T00:00:00Z",
        "endTime": "2026-02-01T00:00:00Z",
        "hardCap": "100",
        "softCap": "20",
        "tokensForSale": "1000",
        "tokenPrice": "0.5",
        "totalRaised": "40",
        "tokensSold": "80",
        "vestingPeriod": 2592000,
        "cliffPeriod": 0,
        "minPurchase": min_purchase,
        "status": "LIVE",
        "token": {
            "id": "tok-1",
            "name": "Creator",
            "symbol": "CRT",
            "mintAddress": "So11111111111111111111111111111111111111112",
            "user": { "profilePicUrl": null, "creatorProfile": null }
        }
    }))
    .expect("valid iro json")
}

pub fn vesting_record(iro_id: &str, claimed: &str, claimable: &str, locked: &str, total: &str) -> VestingRecord {
    VestingRecord {
        id: format!("alloc-{iro_id}"),
        token: VestingToken {
            id: "tok-1".into(),
            name: "Creator".into(),
            symbol: "CRT".into(),
            logo_url: None,
            mint_address: "mint".into(),
        },
        iro_id: iro_id.into(),
        total_amount: total.into(),
        unlocked_amount: "0".into(),
        claimed_amount: claimed.into(),
        claimable_amount: claimable.into(),
        locked_amount: locked.into(),
        vesting_progress: 0.5,
        is_fully_vested: false,
        next_unlock_time: None,
        vesting_end_time: 0,
    }
}

fn add_decimal(a: &str, b: &str) -> String {
    let sum = a.parse::<f64>().unwrap_or(0.0) + b.parse::<f64>().unwrap_or(0.0);
    format!("{sum}")
}

/// Records every call and keeps a tiny vesting ledger.
#[derive(Default)]
pub struct FakeBackend {
    pub calls: Mutex<Vec<String>>,
    pub intent_keys: Mutex<Vec<String>>,
    pub confirmations: Mutex<Vec<(ConfirmRequest, String)>>,
    /// Confirm calls that fail before one succeeds
    pub confirm_failures: AtomicUsize,
    pub ledger: Mutex<Vec<VestingRecord>>,
    /// IRO ids whose claim the server refuses
    pub failing_claims: Mutex<Vec<String>>,
    /// Multiplies the amount the server puts in new intents
    pub intent_amount_factor: Mutex<Option<f64>>,
    /// Deposit address the server puts in new intents
    pub intent_deposit: Mutex<Option<String>>,
    pub applications: Mutex<Vec<CreatorApplicationRequest>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_ledger(records: Vec<VestingRecord>) -> Arc<Self> {
        let backend = Self::default();
        *backend.ledger.lock().unwrap() = records;
        Arc::new(backend)
    }

    pub fn fail_confirms(&self, times: usize) {
        self.confirm_failures.store(times, Ordering::SeqCst);
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

#[async_trait]
impl IroBackend for FakeBackend {
    async fn list_iros(&self, _params: &ListParams) -> Result<IroPage> {
        self.record("list_iros");
        Ok(IroPage {
            data: vec![sample_iro(None)],
            meta: PageMeta {
                total: 1,
                page: 1,
                limit: 20,
                total_pages: 1,
            },
        })
    }

    async fn get_iro(&self, _iro_id: &str) -> Result<Iro> {
        self.record("get_iro");
        Ok(sample_iro(None))
    }

    async fn create_intent(
        &self,
        _token: &str,
        iro_id: &str,
        amount_sol: f64,
        key: &IdempotencyKey,
    ) -> Result<PurchaseIntent> {
        self.record("create_intent");
        self.intent_keys.lock().unwrap().push(key.to_string());
        let quoted = amount_sol * self.intent_amount_factor.lock().unwrap().unwrap_or(1.0);
        Ok(PurchaseIntent {
            iro_id: iro_id.to_string(),
            deposit_address: self
                .intent_deposit
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(deposit_address),
            amount_sol: quoted,
            estimated_tokens: format!("{}", quoted / 0.5),
        })
    }

    async fn confirm_purchase(
        &self,
        _token: &str,
        _iro_id: &str,
        request: &ConfirmRequest,
        key: &IdempotencyKey,
    ) -> Result<PurchaseResult> {
        self.record("confirm_purchase");
        self.confirmations
            .lock()
            .unwrap()
            .push((request.clone(), key.to_string()));
        let remaining = self.confirm_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.confirm_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ClientError::backend(Some(400), "Deposit not found on-chain yet"));
        }
        Ok(PurchaseResult {
            status: "COMPLETED".to_string(),
            tokens_credited: request.amount / 0.5,
        })
    }

    async fn participants(&self, _iro_id: &str) -> Result<Vec<IroParticipant>> {
        self.record("participants");
        Ok(vec![])
    }

    async fn investments(&self, _token: &str) -> Result<Vec<VestingRecord>> {
        self.record("investments");
        Ok(self.ledger.lock().unwrap().clone())
    }

    async fn claim(&self, _token: &str, iro_id: &str) -> Result<ClaimResult> {
        self.record("claim");
        if self.failing_claims.lock().unwrap().iter().any(|id| id == iro_id) {
            return Err(ClientError::backend(Some(500), "Claim transaction failed"));
        }
        let mut ledger = self.ledger.lock().unwrap();
        let record = ledger
            .iter_mut()
            .find(|r| r.iro_id == iro_id)
            .ok_or_else(|| ClientError::backend(Some(404), "Allocation not found"))?;
        let amount = record.claimable_amount.clone();
        record.claimed_amount = add_decimal(&record.claimed_amount, &amount);
        record.claimable_amount = "0".to_string();
        Ok(ClaimResult {
            tx_signature: format!("claim-{iro_id}"),
            amount_claimed: amount,
            remaining: "0".to_string(),
        })
    }

    async fn portfolio(&self, _token: &str) -> Result<Vec<PortfolioItem>> {
        self.record("portfolio");
        Ok(vec![])
    }

    async fn submit_application(
        &self,
        _token: &str,
        request: &CreatorApplicationRequest,
    ) -> Result<CreatorApplication> {
        self.record("submit_application");
        self.applications.lock().unwrap().push(request.clone());
        Ok(serde_json::from_value(json!({
            "id": "app-1",
            "userId": "user-1",
            "name": request.name,
            "description": request.description,
            "contactNumber": request.contact_number,
            "emailAddress": request.email_address,
            "state": "SUBMITTED",
            "createdAt": "2026-01-01T00:00:00Z",
            "socials": request.socials,
        }))
        .expect("valid application json"))
    }

    async fn list_applications(&self, _token: &str, _params: &ListParams) -> Result<ApplicationPage> {
        self.record("list_applications");
        Ok(ApplicationPage {
            data: vec![],
            meta: Value::Null,
        })
    }

    async fn approve_application(
        &self,
        _token: &str,
        _application_id: &str,
        _sector: &str,
    ) -> Result<Value> {
        self.record("approve_application");
        Ok(json!({}))
    }
}

pub struct FakeRpc {
    pub balance: u64,
    pub blockhash_down: bool,
    pub balance_calls: AtomicUsize,
    pub blockhash_calls: AtomicUsize,
}

impl FakeRpc {
    pub fn with_balance(balance: u64) -> Arc<Self> {
        Arc::new(Self {
            balance,
            blockhash_down: false,
            balance_calls: AtomicUsize::new(0),
            blockhash_calls: AtomicUsize::new(0),
        })
    }

    /// Answers balance queries but fails every blockhash fetch.
    pub fn without_blockhash(balance: u64) -> Arc<Self> {
        Arc::new(Self {
            balance,
            blockhash_down: true,
            balance_calls: AtomicUsize::new(0),
            blockhash_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ChainRpc for FakeRpc {
    async fn balance_lamports(&self, _address: &str) -> Result<u64> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.balance)
    }

    async fn latest_blockhash(&self) -> Result<LatestBlockhash> {
        self.blockhash_calls.fetch_add(1, Ordering::SeqCst);
        if self.blockhash_down {
            return Err(ClientError::Rpc("blockhash unavailable".to_string()));
        }
        Ok(LatestBlockhash {
            blockhash: Hash::new_from_array([7u8; 32]).to_string(),
            last_valid_block_height: 1_000,
        })
    }
}

#[derive(Default)]
pub struct FakeSigner {
    pub reject: bool,
    /// Simulated time the wallet prompt stays open
    pub delay_ms: u64,
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<SignRequest>>,
}

impl FakeSigner {
    pub fn approving() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            reject: true,
            ..Default::default()
        })
    }

    pub fn slow(delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            delay_ms,
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletSigner for FakeSigner {
    async fn sign_and_send(&self, request: SignRequest) -> Result<SignOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if self.reject {
            return Err(ClientError::Wallet("User rejected the request".to_string()));
        }
        Ok(SignOutput {
            signature: vec![SIGNATURE_BYTE; 64],
        })
    }
}

/// Base58 signature the fake signer produces.
pub fn fake_signature() -> String {
    bs58::encode(vec![SIGNATURE_BYTE; 64]).into_string()
}

pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub rpc: Arc<FakeRpc>,
    pub signer: Arc<FakeSigner>,
    pub journal: Arc<SqliteJournal>,
    pub cache: ViewCache,
    pub orchestrator: PurchaseOrchestrator,
}

/// Journal whose broadcast writes always fail; everything else reaches the inner journal.
pub struct BroadcastLosingJournal {
    pub inner: Arc<SqliteJournal>,
    pub broadcast_attempts: AtomicUsize,
}

#[async_trait]
impl ConfirmationJournal for BroadcastLosingJournal {
    async fn record_intent(&self, intent: NewIntent<'_>) -> anyhow::Result<()> {
        self.inner.record_intent(intent).await
    }

    async fn record_broadcast(&self, _idempotency_key: &str, _signature: &str) -> anyhow::Result<()> {
        self.broadcast_attempts.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("disk full")
    }

    async fn mark_confirmed(&self, idempotency_key: &str) -> anyhow::Result<()> {
        self.inner.mark_confirmed(idempotency_key).await
    }

    async fn mark_failed(&self, idempotency_key: &str, error: &str) -> anyhow::Result<()> {
        self.inner.mark_failed(idempotency_key, error).await
    }

    async fn note_error(&self, idempotency_key: &str, error: &str) -> anyhow::Result<()> {
        self.inner.note_error(idempotency_key, error).await
    }

    async fn get(&self, idempotency_key: &str) -> anyhow::Result<Option<JournalEntry>> {
        self.inner.get(idempotency_key).await
    }

    async fn pending_broadcasts(&self) -> anyhow::Result<Vec<JournalEntry>> {
        self.inner.pending_broadcasts().await
    }
}

pub async fn harness(backend: Arc<FakeBackend>, rpc: Arc<FakeRpc>, signer: Arc<FakeSigner>) -> Harness {
    harness_with_journal(backend, rpc, signer, |journal| journal as Arc<dyn ConfirmationJournal>).await
}

/// Harness whose orchestrator writes through `wrap(journal)`; `Harness::journal` stays the SQLite store.
pub async fn harness_with_journal<F>(
    backend: Arc<FakeBackend>,
    rpc: Arc<FakeRpc>,
    signer: Arc<FakeSigner>,
    wrap: F,
) -> Harness
where
    F: FnOnce(Arc<SqliteJournal>) -> Arc<dyn ConfirmationJournal>,
{
    let config = ClientBuilder::new()
        .with_cluster(Cluster::Devnet)
        .with_confirm_retry(3, 1)
        .build();
    let journal = Arc::new(SqliteJournal::in_memory().await.expect("in-memory journal"));
    let cache = ViewCache::new(&config);
    let orchestrator = PurchaseOrchestrator::new(
        backend.clone(),
        rpc.clone(),
        signer.clone(),
        wrap(journal.clone()),
        cache.clone(),
        config,
    );
    Harness {
        backend,
        rpc,
        signer,
        journal,
        cache,
        orchestrator,
    }
}
