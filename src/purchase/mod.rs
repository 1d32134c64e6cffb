//! Token purchase: the orchestrated workflow, its wire types and the
//! confirmation journal.

pub mod journal;
pub mod orchestrator;
pub mod types;

pub use journal::{ConfirmationJournal, JournalEntry, JournalStatus, NewIntent, SqliteJournal};
pub use orchestrator::{validate_amount, PurchaseOrchestrator, PurchaseQuote, ReconcileReport};
pub use types::{
    ConfirmRequest, IdempotencyKey, IntentRequest, PurchaseIntent, PurchaseOutcome, PurchaseResult,
    SignedSubmission,
};
