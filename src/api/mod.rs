//! Backend REST API.
//!
//! Every endpoint answers with an `{ok, message, data}` envelope. The
//! [`IroBackend`] trait is the seam the orchestrators depend on; [`HttpBackend`]
//! is the `reqwest` implementation.

pub mod http;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;
use crate::onboarding::CreatorApplicationRequest;
use crate::purchase::types::{ConfirmRequest, IdempotencyKey, PurchaseIntent, PurchaseResult};
use crate::types::{ApplicationPage, CreatorApplication, Iro, IroPage, IroParticipant, PortfolioItem};
use crate::vesting::types::{ClaimResult, VestingRecord};

pub use http::HttpBackend;

/// Response wrapper used by every backend endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub ok: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<T>,
}

/// Pagination and status filter for list endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct ListParams {
    pub page: u32,
    pub limit: u32,
    pub status: Option<String>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            status: None,
        }
    }
}

impl ListParams {
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.max(1).to_string()),
            ("limit", self.limit.max(1).to_string()),
        ];
        if let Some(status) = &self.status {
            pairs.push(("status", status.clone()));
        }
        pairs
    }
}

/// Operations the backend exposes to the client.
#[async_trait]
pub trait IroBackend: Send + Sync {
    async fn list_iros(&self, params: &ListParams) -> Result<IroPage>;

    async fn get_iro(&self, iro_id: &str) -> Result<Iro>;

    /// Ask the server for a deposit intent for `amount_sol`.
    async fn create_intent(
        &self,
        token: &str,
        iro_id: &str,
        amount_sol: f64,
        key: &IdempotencyKey,
    ) -> Result<PurchaseIntent>;

    /// Report a broadcast transfer so the server can verify and credit it.
    async fn confirm_purchase(
        &self,
        token: &str,
        iro_id: &str,
        request: &ConfirmRequest,
        key: &IdempotencyKey,
    ) -> Result<PurchaseResult>;

    async fn participants(&self, iro_id: &str) -> Result<Vec<IroParticipant>>;

    async fn investments(&self, token: &str) -> Result<Vec<VestingRecord>>;

    /// Claim whatever the server computes as claimable for this offering.
    async fn claim(&self, token: &str, iro_id: &str) -> Result<ClaimResult>;

    async fn portfolio(&self, token: &str) -> Result<Vec<PortfolioItem>>;

    /// Apply for onboarding as the token's user.
    async fn submit_application(
        &self,
        token: &str,
        request: &CreatorApplicationRequest,
    ) -> Result<CreatorApplication>;

    async fn list_applications(&self, token: &str, params: &ListParams) -> Result<ApplicationPage>;

    async fn approve_application(
        &self,
        token: &str,
        application_id: &str,
        sector: &str,
    ) -> Result<serde_json::Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_params_defaults() {
        let pairs = ListParams::default().query_pairs();
        assert_eq!(
            pairs,
            vec![("page", "1".to_string()), ("limit", "20".to_string())]
        );
    }

    #[test]
    fn test_list_params_status_filter() {
        let pairs = ListParams::default().with_status("LIVE").query_pairs();
        assert_eq!(pairs.last(), Some(&("status", "LIVE".to_string())));
    }

    #[test]
    fn test_list_params_clamps_zero_page() {
        let params = ListParams {
            page: 0,
            limit: 0,
            status: None,
        };
        assert_eq!(params.query_pairs()[0].1, "1");
        assert_eq!(params.query_pairs()[1].1, "1");
    }
}
