//! Vesting allocations and claims.

pub mod claim_client;
pub mod types;

pub use claim_client::{ClaimAllReport, ClaimOutcome, VestingClaimClient};
pub use types::{ClaimResult, VestingRecord, VestingToken};
