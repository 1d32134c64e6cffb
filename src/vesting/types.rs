//! Vesting snapshot types. All values are server-computed and read-only here.

use serde::{Deserialize, Serialize};

use crate::types::{parse_decimal, Address};

/// Tolerance used when checking decimal-string sums.
const AMOUNT_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VestingToken {
    pub id: String,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    pub mint_address: Address,
}

/// A user's allocation in one offering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VestingRecord {
    /// Allocation id
    pub id: String,
    pub token: VestingToken,
    pub iro_id: String,
    pub total_amount: String,
    pub unlocked_amount: String,
    pub claimed_amount: String,
    pub claimable_amount: String,
    pub locked_amount: String,
    /// Fraction vested, 0 to 1
    pub vesting_progress: f64,
    pub is_fully_vested: bool,
    /// Unix millis of the next unlock, if any
    #[serde(default)]
    pub next_unlock_time: Option<i64>,
    /// Unix millis when vesting completes
    pub vesting_end_time: i64,
}

impl VestingRecord {
    pub fn claimable(&self) -> f64 {
        parse_decimal(&self.claimable_amount).unwrap_or(0.0)
    }

    pub fn has_claimable(&self) -> bool {
        self.claimable() > 0.0
    }

    pub fn total(&self) -> f64 {
        parse_decimal(&self.total_amount).unwrap_or(0.0)
    }

    /// `claimed + claimable + locked == total`, within tolerance.
    pub fn is_consistent(&self) -> bool {
        let parts = [
            &self.claimed_amount,
            &self.claimable_amount,
            &self.locked_amount,
        ];
        let mut sum = 0.0;
        for part in parts {
            match parse_decimal(part) {
                Some(value) => sum += value,
                None => return false,
            }
        }
        (sum - self.total()).abs() <= AMOUNT_EPSILON * self.total().max(1.0)
    }

    pub fn progress_percent(&self) -> f64 {
        (self.vesting_progress * 100.0).clamp(0.0, 100.0)
    }

    /// Human-readable time remaining until fully vested.
    pub fn time_left(&self, now_ms: i64) -> String {
        if self.is_fully_vested {
            return "Vesting Complete".to_string();
        }
        let diff = self.vesting_end_time - now_ms;
        if diff <= 0 {
            return "Vesting Complete".to_string();
        }
        let day_ms = 1000 * 60 * 60 * 24;
        let days = diff / day_ms;
        let hours = (diff % day_ms) / (1000 * 60 * 60);
        if days > 0 {
            format!("{days} days left")
        } else {
            format!("{hours} hours left")
        }
    }
}

/// Outcome of a settled claim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResult {
    pub tx_signature: String,
    pub amount_claimed: String,
    pub remaining: String,
}
