//! Per-key mutual exclusion for user-triggered operations.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::warn;

use crate::error::{ClientError, Result};

/// Keys of operations currently running.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    keys: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`, failing if an operation with the same key is running.
    pub fn acquire(&self, key: impl Into<String>) -> Result<InFlightGuard> {
        let key = key.into();
        let mut keys = self.keys.lock().unwrap_or_else(|e| e.into_inner());
        if !keys.insert(key.clone()) {
            warn!("Rejected duplicate submission for {}", key);
            return Err(ClientError::OperationInFlight(key));
        }
        Ok(InFlightGuard {
            keys: self.keys.clone(),
            key,
        })
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }
}

/// Releases its key on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    keys: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_rejected_until_released() {
        let in_flight = InFlight::new();
        let guard = in_flight.acquire("wallet:iro-1").unwrap();
        assert!(matches!(
            in_flight.acquire("wallet:iro-1"),
            Err(ClientError::OperationInFlight(_))
        ));
        assert!(in_flight.acquire("wallet:iro-2").is_ok());
        drop(guard);
        assert!(!in_flight.is_active("wallet:iro-1"));
        assert!(in_flight.acquire("wallet:iro-1").is_ok());
    }
}
