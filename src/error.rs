//! Error taxonomy for client operations.
//!
//! Validation and precondition errors are raised before any network or chain
//! call. Backend errors carry the server's `message` verbatim so callers can
//! show it to the user unchanged.

use thiserror::Error;

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Bad user input (amount, form fields).
    #[error("{0}")]
    Validation(String),

    #[error("amount is below the minimum purchase of {minimum} SOL")]
    BelowMinimum { minimum: f64 },

    #[error("please log in to continue")]
    NotAuthenticated,

    #[error("no wallet connected")]
    WalletNotConnected,

    #[error("insufficient funds: need {required} lamports, wallet holds {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("nothing to claim for {iro_id}")]
    NothingToClaim { iro_id: String },

    #[error("an operation for {0} is already in progress")]
    OperationInFlight(String),

    /// The server's intent disagrees with what the user asked to buy.
    #[error("purchase intent for {iro_id} asks for {quoted} SOL, expected {requested} SOL")]
    IntentMismatch {
        iro_id: String,
        requested: f64,
        quoted: f64,
    },

    /// Non-ok envelope or non-2xx response; the message comes from the server.
    #[error("{message}")]
    Backend { status: Option<u16>, message: String },

    #[error("wallet error: {0}")]
    Wallet(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("transaction build error: {0}")]
    TransactionBuild(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("journal error: {0:#}")]
    Journal(#[source] anyhow::Error),

    /// The transfer was broadcast but the backend has not recorded it yet.
    /// Retry confirmation with the same signature; never sign again.
    #[error("transaction {signature} was sent but confirmation failed: {source}")]
    ConfirmationPending {
        idempotency_key: String,
        signature: String,
        #[source]
        source: Box<ClientError>,
    },
}

impl ClientError {
    pub fn backend(status: Option<u16>, message: impl Into<String>) -> Self {
        ClientError::Backend {
            status,
            message: message.into(),
        }
    }

    /// Text to show the user. Backend messages pass through unchanged.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Backend { message, .. } => message.clone(),
            ClientError::ConfirmationPending { source, .. } => source.user_message(),
            other => other.to_string(),
        }
    }

    /// True when funds may already have moved on-chain.
    pub fn funds_may_have_moved(&self) -> bool {
        matches!(self, ClientError::ConfirmationPending { .. })
    }

    /// True for errors raised before any network or chain call.
    pub fn is_local_rejection(&self) -> bool {
        matches!(
            self,
            ClientError::Validation(_)
                | ClientError::BelowMinimum { .. }
                | ClientError::NotAuthenticated
                | ClientError::WalletNotConnected
                | ClientError::NothingToClaim { .. }
                | ClientError::OperationInFlight(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_message_is_verbatim() {
        let err = ClientError::backend(Some(400), "IRO is not live");
        assert_eq!(err.to_string(), "IRO is not live");
    }

    #[test]
    fn test_confirmation_pending_flags_moved_funds() {
        let err = ClientError::ConfirmationPending {
            idempotency_key: "k".into(),
            signature: "sig".into(),
            source: Box::new(ClientError::backend(Some(400), "Deposit not found")),
        };
        assert!(err.funds_may_have_moved());
        assert!(!err.is_local_rejection());
        assert!(err.to_string().contains("sig"));
        assert_eq!(err.user_message(), "Deposit not found");
    }

    #[test]
    fn test_local_rejections() {
        assert!(ClientError::Validation("bad".into()).is_local_rejection());
        assert!(ClientError::BelowMinimum { minimum: 0.1 }.is_local_rejection());
        assert!(!ClientError::Rpc("down".into()).is_local_rejection());
    }

    #[test]
    fn test_intent_mismatch_names_both_amounts() {
        let err = ClientError::IntentMismatch {
            iro_id: "iro-1".into(),
            requested: 1.0,
            quoted: 10.0,
        };
        assert!(!err.funds_may_have_moved());
        assert_eq!(
            err.user_message(),
            "purchase intent for iro-1 asks for 10 SOL, expected 1 SOL"
        );
    }
}
