//! iro-client - Client-side purchase and vesting-claim workflow for
//! creator-token Initial Return Offerings on Solana.
//!
//! The backend owns pricing, the vesting ledger and application approval.
//! This crate sequences the user-facing operations around it: validating and
//! funding a purchase, building and signing the SOL transfer, confirming it
//! with the backend, and claiming unlocked tokens.

pub mod api;
pub mod cache;
pub mod chain;
pub mod config;
pub mod error;
pub mod in_flight;
pub mod onboarding;
pub mod purchase;
pub mod session;
pub mod types;
pub mod vesting;

// Re-export main types for convenience
pub use api::{HttpBackend, IroBackend};
pub use config::{ClientBuilder, ClientConfig, Cluster};
pub use error::{ClientError, Result};
pub use purchase::{PurchaseOrchestrator, SqliteJournal};
pub use session::{AuthSession, StaticSession, WalletHandle};
pub use types::{Iro, IroStatus};
pub use vesting::VestingClaimClient;
