//! Short-lived views of server state.
//!
//! Entries are disposable copies for display. A purchase invalidates the IRO,
//! investments and balance views it touched; a claim invalidates investments
//! and balance.

use moka::future::Cache;
use tracing::debug;

use crate::config::ClientConfig;
use crate::types::Iro;
use crate::vesting::types::VestingRecord;

#[derive(Clone)]
pub struct ViewCache {
    iros: Cache<String, Iro>,
    /// Keyed by wallet address
    investments: Cache<String, Vec<VestingRecord>>,
    /// Lamports, keyed by wallet address
    balances: Cache<String, u64>,
}

impl ViewCache {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            iros: build_cache(config),
            investments: build_cache(config),
            balances: build_cache(config),
        }
    }

    pub async fn iro(&self, iro_id: &str) -> Option<Iro> {
        self.iros.get(iro_id).await
    }

    pub async fn store_iro(&self, iro: Iro) {
        self.iros.insert(iro.id.clone(), iro).await;
    }

    pub async fn investments(&self, wallet: &str) -> Option<Vec<VestingRecord>> {
        self.investments.get(wallet).await
    }

    pub async fn store_investments(&self, wallet: &str, records: Vec<VestingRecord>) {
        self.investments.insert(wallet.to_string(), records).await;
    }

    pub async fn balance(&self, wallet: &str) -> Option<u64> {
        self.balances.get(wallet).await
    }

    pub async fn store_balance(&self, wallet: &str, lamports: u64) {
        self.balances.insert(wallet.to_string(), lamports).await;
    }

    pub async fn invalidate_after_purchase(&self, iro_id: &str, wallet: &str) {
        self.iros.invalidate(iro_id).await;
        self.investments.invalidate(wallet).await;
        self.balances.invalidate(wallet).await;
        debug!("Invalidated views for {} after purchase by {}", iro_id, wallet);
    }

    pub async fn invalidate_after_claim(&self, wallet: &str) {
        self.investments.invalidate(wallet).await;
        self.balances.invalidate(wallet).await;
        debug!("Invalidated views after claim by {}", wallet);
    }
}

fn build_cache<V>(config: &ClientConfig) -> Cache<String, V>
where
    V: Clone + Send + Sync + 'static,
{
    Cache::builder()
        .max_capacity(config.max_cache_entries)
        .time_to_live(config.cache_ttl())
        .build()
}
