//! Authentication and wallet capability injected into the orchestrators.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

use crate::types::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletKind {
    /// Provider-managed key tied to the user's session
    Embedded,
    External,
}

/// A connected wallet that can be asked to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletHandle {
    pub address: Address,
    pub kind: WalletKind,
}

impl WalletHandle {
    pub fn embedded(address: impl Into<Address>) -> Self {
        Self {
            address: address.into(),
            kind: WalletKind::Embedded,
        }
    }

    pub fn external(address: impl Into<Address>) -> Self {
        Self {
            address: address.into(),
            kind: WalletKind::External,
        }
    }
}

/// Pick the embedded wallet when present, otherwise the first one.
pub fn select_wallet(wallets: &[WalletHandle]) -> Option<WalletHandle> {
    wallets
        .iter()
        .find(|w| w.kind == WalletKind::Embedded)
        .or_else(|| wallets.first())
        .cloned()
}

/// The authenticated user and their wallets.
#[async_trait]
pub trait AuthSession: Send + Sync {
    /// Bearer token for the backend, `None` when logged out or expired.
    async fn access_token(&self) -> Option<String>;

    fn wallets(&self) -> Vec<WalletHandle>;

    /// Start the provider's wallet-connect flow.
    fn request_wallet_connect(&self);

    fn wallet(&self) -> Option<WalletHandle> {
        select_wallet(&self.wallets())
    }
}

/// Session with a fixed token and wallet list.
#[derive(Debug, Default)]
pub struct StaticSession {
    token: Option<String>,
    wallets: Vec<WalletHandle>,
    connect_requests: AtomicUsize,
}

impl StaticSession {
    pub fn new(token: Option<String>, wallets: Vec<WalletHandle>) -> Self {
        Self {
            token,
            wallets,
            connect_requests: AtomicUsize::new(0),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// How many times a wallet-connect flow was requested.
    pub fn connect_requests(&self) -> usize {
        self.connect_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthSession for StaticSession {
    async fn access_token(&self) -> Option<String> {
        self.token.clone()
    }

    fn wallets(&self) -> Vec<WalletHandle> {
        self.wallets.clone()
    }

    fn request_wallet_connect(&self) {
        self.connect_requests.fetch_add(1, Ordering::SeqCst);
        info!("Wallet connection requested; connect a wallet and retry");
    }
}
