//! `reqwest` implementation of the backend API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::api::{Envelope, IroBackend, ListParams};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::onboarding::CreatorApplicationRequest;
use crate::purchase::types::{
    ConfirmRequest, IdempotencyKey, IntentRequest, PurchaseIntent, PurchaseResult,
};
use crate::types::{ApplicationPage, CreatorApplication, Iro, IroPage, IroParticipant, PortfolioItem};
use crate::vesting::types::{ClaimResult, VestingRecord};

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Backend client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http_client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(http_client: Client, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::new(http_client, config.api_url.clone()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, fallback: &str) -> Result<T> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        decode_envelope(status, &body, fallback)
    }
}

/// Unwrap an `{ok, message, data}` body.
///
/// A non-ok envelope or non-2xx status fails with the server's message,
/// falling back to `fallback` when the server sent none.
pub fn decode_envelope<T: DeserializeOwned>(status: u16, body: &str, fallback: &str) -> Result<T> {
    let success_status = (200..300).contains(&status);
    let envelope: Envelope<Value> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Unparseable backend response (status {}): {}", status, e);
            return Err(ClientError::backend(Some(status), fallback));
        }
    };

    if !success_status || !envelope.ok {
        let message = if envelope.message.trim().is_empty() {
            fallback.to_string()
        } else {
            envelope.message
        };
        return Err(ClientError::backend(Some(status), message));
    }

    let data = envelope.data.unwrap_or(Value::Null);
    serde_json::from_value(data).map_err(|e| {
        warn!("Backend data did not match the expected shape: {}", e);
        ClientError::backend(Some(status), format!("{fallback}: malformed response"))
    })
}

#[async_trait]
impl IroBackend for HttpBackend {
    #[instrument(skip(self))]
    async fn list_iros(&self, params: &ListParams) -> Result<IroPage> {
        let request = self
            .http_client
            .get(self.url("/v1/iro/list"))
            .query(&params.query_pairs());
        self.send(request, "Failed to fetch IROs").await
    }

    #[instrument(skip(self))]
    async fn get_iro(&self, iro_id: &str) -> Result<Iro> {
        let request = self.http_client.get(self.url(&format!("/v1/iro/{iro_id}")));
        self.send(request, "Failed to fetch IRO").await
    }

    #[instrument(skip(self, token), fields(key = %key))]
    async fn create_intent(
        &self,
        token: &str,
        iro_id: &str,
        amount_sol: f64,
        key: &IdempotencyKey,
    ) -> Result<PurchaseIntent> {
        let request = self
            .http_client
            .post(self.url(&format!("/v1/iro/{iro_id}/buy")))
            .bearer_auth(token)
            .header(IDEMPOTENCY_HEADER, key.as_str())
            .json(&IntentRequest { amount: amount_sol });
        let intent: PurchaseIntent = self.send(request, "Failed to initiate purchase").await?;
        debug!("Intent created: deposit to {}", intent.deposit_address);
        Ok(intent)
    }

    #[instrument(skip(self, token, request), fields(signature = %request.signature, key = %key))]
    async fn confirm_purchase(
        &self,
        token: &str,
        iro_id: &str,
        request: &ConfirmRequest,
        key: &IdempotencyKey,
    ) -> Result<PurchaseResult> {
        let http_request = self
            .http_client
            .post(self.url(&format!("/v1/iro/{iro_id}/confirm")))
            .bearer_auth(token)
            .header(IDEMPOTENCY_HEADER, key.as_str())
            .json(request);
        self.send(http_request, "Failed to confirm purchase").await
    }

    #[instrument(skip(self))]
    async fn participants(&self, iro_id: &str) -> Result<Vec<IroParticipant>> {
        let request = self
            .http_client
            .get(self.url(&format!("/v1/iro/{iro_id}/participants")));
        self.send(request, "Failed to fetch participants").await
    }

    #[instrument(skip(self, token))]
    async fn investments(&self, token: &str) -> Result<Vec<VestingRecord>> {
        let request = self
            .http_client
            .get(self.url("/v1/iro/user/investments"))
            .bearer_auth(token);
        self.send(request, "Failed to fetch user investments").await
    }

    #[instrument(skip(self, token))]
    async fn claim(&self, token: &str, iro_id: &str) -> Result<ClaimResult> {
        let request = self
            .http_client
            .post(self.url(&format!("/v1/iro/{iro_id}/claim")))
            .bearer_auth(token);
        self.send(request, "Failed to claim tokens").await
    }

    #[instrument(skip(self, token))]
    async fn portfolio(&self, token: &str) -> Result<Vec<PortfolioItem>> {
        let request = self
            .http_client
            .get(self.url("/v1/user/portfolio"))
            .bearer_auth(token);
        self.send(request, "Failed to fetch portfolio").await
    }

    #[instrument(skip(self, token, request))]
    async fn submit_application(
        &self,
        token: &str,
        request: &CreatorApplicationRequest,
    ) -> Result<CreatorApplication> {
        let http_request = self
            .http_client
            .post(self.url("/v1/creator-onboarding"))
            .bearer_auth(token)
            .json(request);
        self.send(http_request, "Failed to submit application").await
    }

    #[instrument(skip(self, token))]
    async fn list_applications(&self, token: &str, params: &ListParams) -> Result<ApplicationPage> {
        let request = self
            .http_client
            .get(self.url("/v1/creator-onboarding"))
            .query(&params.query_pairs())
            .bearer_auth(token);
        self.send(request, "Failed to fetch applications").await
    }

    #[instrument(skip(self, token))]
    async fn approve_application(
        &self,
        token: &str,
        application_id: &str,
        sector: &str,
    ) -> Result<Value> {
        let request = self
            .http_client
            .post(self.url(&format!("/v1/creator-onboarding/{application_id}/approve")))
            .bearer_auth(token)
            .json(&json!({ "sector": sector }));
        self.send(request, "Failed to approve application").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::purchase::types::PurchaseResult;

    #[test]
    fn test_decode_ok_envelope() {
        let body = r#"{"ok":true,"message":"","data":{"status":"COMPLETED","tokens":4}}"#;
        let result: PurchaseResult = decode_envelope(200, body, "Failed").unwrap();
        assert_eq!(result.status, "COMPLETED");
        assert_eq!(result.tokens_credited, 4.0);
    }

    #[test]
    fn test_decode_not_ok_surfaces_message_verbatim() {
        let body = r#"{"ok":false,"message":"Transaction not found on chain","data":null}"#;
        let err = decode_envelope::<PurchaseResult>(200, body, "Failed to confirm purchase")
            .unwrap_err();
        assert_eq!(err.to_string(), "Transaction not found on chain");
    }

    #[test]
    fn test_decode_non_2xx_with_ok_flag_still_fails() {
        let body = r#"{"ok":true,"message":"weird","data":{}}"#;
        let err = decode_envelope::<Value>(500, body, "Failed").unwrap_err();
        assert!(matches!(err, ClientError::Backend { status: Some(500), .. }));
    }

    #[test]
    fn test_decode_empty_message_uses_fallback() {
        let body = r#"{"ok":false,"message":"","data":null}"#;
        let err = decode_envelope::<Value>(400, body, "Failed to claim tokens").unwrap_err();
        assert_eq!(err.to_string(), "Failed to claim tokens");
    }

    #[test]
    fn test_decode_garbage_body() {
        let err = decode_envelope::<Value>(502, "<html>bad gateway</html>", "Failed to fetch IRO")
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch IRO");
    }

    #[test]
    fn test_json_requests_carry_one_content_type() {
        let backend = HttpBackend::new(Client::new(), "http://localhost:8000/api");
        let request = backend
            .http_client
            .post(backend.url("/v1/iro/iro-1/buy"))
            .json(&IntentRequest { amount: 1.0 })
            .build()
            .unwrap();
        let content_types: Vec<_> = request
            .headers()
            .get_all(reqwest::header::CONTENT_TYPE)
            .iter()
            .map(|value| value.to_str().unwrap())
            .collect();
        assert_eq!(content_types, vec!["application/json"]);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let backend = HttpBackend::new(Client::new(), "http://localhost:8000/api/");
        assert_eq!(backend.url("/v1/iro/list"), "http://localhost:8000/api/v1/iro/list");
    }
}
