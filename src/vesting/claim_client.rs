//! Vesting snapshot retrieval and claims.
//!
//! The server owns the ledger. The client only decides whether a claim is
//! worth sending (a positive claimable amount in the last snapshot) and then
//! refetches rather than adjusting amounts itself.

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::api::IroBackend;
use crate::cache::ViewCache;
use crate::error::{ClientError, Result};
use crate::in_flight::InFlight;
use crate::session::AuthSession;
use crate::vesting::types::{ClaimResult, VestingRecord};

#[derive(Debug, Clone)]
pub struct ClaimOutcome {
    pub iro_id: String,
    pub result: ClaimResult,
    /// Snapshot fetched after the claim; `None` when the refetch failed
    pub refreshed: Option<Vec<VestingRecord>>,
}

#[derive(Debug, Default)]
pub struct ClaimAllReport {
    pub claimed: Vec<(String, ClaimResult)>,
    /// IRO id and the reason its claim failed
    pub failed: Vec<(String, String)>,
    /// Allocations with nothing claimable
    pub skipped: usize,
    pub refreshed: Option<Vec<VestingRecord>>,
}

pub struct VestingClaimClient {
    backend: Arc<dyn IroBackend>,
    cache: ViewCache,
    in_flight: InFlight,
}

impl VestingClaimClient {
    pub fn new(backend: Arc<dyn IroBackend>, cache: ViewCache) -> Self {
        Self {
            backend,
            cache,
            in_flight: InFlight::new(),
        }
    }

    /// The user's allocations, from cache when fresh.
    pub async fn investments(&self, session: &dyn AuthSession) -> Result<Vec<VestingRecord>> {
        let token = session
            .access_token()
            .await
            .ok_or(ClientError::NotAuthenticated)?;
        if let Some(wallet) = session.wallet() {
            if let Some(records) = self.cache.investments(&wallet.address).await {
                return Ok(records);
            }
        }
        self.fetch(&token, session).await
    }

    /// Refetch the snapshot, bypassing the cache.
    pub async fn refresh(&self, session: &dyn AuthSession) -> Result<Vec<VestingRecord>> {
        let token = session
            .access_token()
            .await
            .ok_or(ClientError::NotAuthenticated)?;
        self.fetch(&token, session).await
    }

    async fn fetch(&self, token: &str, session: &dyn AuthSession) -> Result<Vec<VestingRecord>> {
        let records = self.backend.investments(token).await?;
        for record in records.iter().filter(|r| !r.is_consistent()) {
            warn!("Allocation {} amounts do not sum to its total", record.id);
        }
        if let Some(wallet) = session.wallet() {
            self.cache
                .store_investments(&wallet.address, records.clone())
                .await;
        }
        debug!("Fetched {} vesting records", records.len());
        Ok(records)
    }

    /// Claim everything currently claimable for `iro_id`.
    ///
    /// Refuses locally, without calling the backend, when the snapshot shows
    /// nothing claimable.
    #[instrument(skip(self, session))]
    pub async fn claim(&self, iro_id: &str, session: &dyn AuthSession) -> Result<ClaimOutcome> {
        let token = session
            .access_token()
            .await
            .ok_or(ClientError::NotAuthenticated)?;
        let snapshot = self.investments(session).await?;
        let claimable = snapshot
            .iter()
            .any(|r| r.iro_id == iro_id && r.has_claimable());
        if !claimable {
            return Err(ClientError::NothingToClaim {
                iro_id: iro_id.to_string(),
            });
        }

        let result = self.send_claim(&token, iro_id, session).await?;
        let refreshed = self.refresh_after_claim(session).await;
        Ok(ClaimOutcome {
            iro_id: iro_id.to_string(),
            result,
            refreshed,
        })
    }

    /// Claim every allocation with a positive claimable amount, in snapshot order.
    #[instrument(skip(self, session))]
    pub async fn claim_all(&self, session: &dyn AuthSession) -> Result<ClaimAllReport> {
        let token = session
            .access_token()
            .await
            .ok_or(ClientError::NotAuthenticated)?;
        let snapshot = self.investments(session).await?;

        let mut report = ClaimAllReport::default();
        for record in &snapshot {
            if !record.has_claimable() {
                report.skipped += 1;
                continue;
            }
            match self.send_claim(&token, &record.iro_id, session).await {
                Ok(result) => report.claimed.push((record.iro_id.clone(), result)),
                Err(e) => {
                    warn!("Claim for {} failed: {}", record.iro_id, e);
                    report.failed.push((record.iro_id.clone(), e.user_message()));
                }
            }
        }
        if !report.claimed.is_empty() {
            report.refreshed = self.refresh_after_claim(session).await;
        }
        info!(
            "Claimed {} allocations, {} failed, {} skipped",
            report.claimed.len(),
            report.failed.len(),
            report.skipped
        );
        Ok(report)
    }

    async fn send_claim(
        &self,
        token: &str,
        iro_id: &str,
        session: &dyn AuthSession,
    ) -> Result<ClaimResult> {
        let wallet = session.wallet().map(|w| w.address).unwrap_or_default();
        let _guard = self.in_flight.acquire(format!("claim:{}:{}", wallet, iro_id))?;

        let result = self.backend.claim(token, iro_id).await?;
        info!(
            "Claimed {} from {} in {}",
            result.amount_claimed, iro_id, result.tx_signature
        );
        self.cache.invalidate_after_claim(&wallet).await;
        Ok(result)
    }

    async fn refresh_after_claim(&self, session: &dyn AuthSession) -> Option<Vec<VestingRecord>> {
        match self.refresh(session).await {
            Ok(records) => Some(records),
            Err(e) => {
                warn!("Claim settled but refreshing the snapshot failed: {}", e);
                None
            }
        }
    }
}
