//! Durable record of purchase attempts.
//!
//! A row is written when the intent is created and updated as the attempt
//! moves through broadcast and confirmation. A row left in `Broadcast` means
//! funds moved on-chain but the backend never acknowledged them; those rows
//! are retried with the stored signature.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqlitePoolOptions, FromRow, Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalStatus {
    IntentCreated,
    Broadcast,
    Confirmed,
    Failed,
}

impl JournalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalStatus::IntentCreated => "intent_created",
            JournalStatus::Broadcast => "broadcast",
            JournalStatus::Confirmed => "confirmed",
            JournalStatus::Failed => "failed",
        }
    }
}

impl FromStr for JournalStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "intent_created" => Ok(JournalStatus::IntentCreated),
            "broadcast" => Ok(JournalStatus::Broadcast),
            "confirmed" => Ok(JournalStatus::Confirmed),
            "failed" => Ok(JournalStatus::Failed),
            other => anyhow::bail!("unknown journal status: {}", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub idempotency_key: String,
    pub iro_id: String,
    pub wallet_address: String,
    pub deposit_address: String,
    /// Amount the user asked for, sent back on confirmation
    pub amount_sol: f64,
    pub signature: Option<String>,
    pub status: JournalStatus,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields known when the intent is created.
#[derive(Debug, Clone)]
pub struct NewIntent<'a> {
    pub idempotency_key: &'a str,
    pub iro_id: &'a str,
    pub wallet_address: &'a str,
    pub deposit_address: &'a str,
    pub amount_sol: f64,
}

#[async_trait]
pub trait ConfirmationJournal: Send + Sync {
    async fn record_intent(&self, intent: NewIntent<'_>) -> Result<()>;

    /// Store the broadcast signature. Errors if the key was never recorded.
    async fn record_broadcast(&self, idempotency_key: &str, signature: &str) -> Result<()>;

    async fn mark_confirmed(&self, idempotency_key: &str) -> Result<()>;

    /// Terminal failure: nothing was broadcast.
    async fn mark_failed(&self, idempotency_key: &str, error: &str) -> Result<()>;

    /// Record a confirmation error without changing status.
    async fn note_error(&self, idempotency_key: &str, error: &str) -> Result<()>;

    async fn get(&self, idempotency_key: &str) -> Result<Option<JournalEntry>>;

    /// Entries broadcast but never confirmed, oldest first.
    async fn pending_broadcasts(&self) -> Result<Vec<JournalEntry>>;
}

#[derive(FromRow)]
struct JournalRow {
    idempotency_key: String,
    iro_id: String,
    wallet_address: String,
    deposit_address: String,
    amount_sol: f64,
    signature: Option<String>,
    status: String,
    last_error: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<JournalRow> for JournalEntry {
    type Error = anyhow::Error;

    fn try_from(row: JournalRow) -> Result<Self> {
        Ok(JournalEntry {
            status: row.status.parse()?,
            idempotency_key: row.idempotency_key,
            iro_id: row.iro_id,
            wallet_address: row.wallet_address,
            deposit_address: row.deposit_address,
            amount_sol: row.amount_sol,
            signature: row.signature,
            last_error: row.last_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct SqliteJournal {
    pool: Pool<Sqlite>,
}

impl SqliteJournal {
    pub async fn open(path: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&format!("sqlite:{}?mode=rwc", path))
            .await
            .with_context(|| format!("Failed to open journal at {}", path))?;
        let journal = Self { pool };
        journal.create_schema().await?;
        info!("Confirmation journal ready at {}", path);
        Ok(journal)
    }

    /// Journal that lives as long as the process. Used by tests and dry runs.
    pub async fn in_memory() -> Result<Self> {
        // A single connection that never expires keeps the in-memory database alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory journal")?;
        let journal = Self { pool };
        journal.create_schema().await?;
        Ok(journal)
    }

    async fn create_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pending_confirmations (
                idempotency_key TEXT PRIMARY KEY,
                iro_id TEXT NOT NULL,
                wallet_address TEXT NOT NULL,
                deposit_address TEXT NOT NULL,
                amount_sol REAL NOT NULL,
                signature TEXT,
                status TEXT NOT NULL,
                last_error TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create pending_confirmations table")?;
        Ok(())
    }

    async fn set_status(
        &self,
        idempotency_key: &str,
        status: JournalStatus,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE pending_confirmations
            SET status = ?, last_error = COALESCE(?, last_error), updated_at = ?
            WHERE idempotency_key = ?;
            "#,
        )
        .bind(status.as_str())
        .bind(error)
        .bind(Utc::now().timestamp_millis())
        .bind(idempotency_key)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to mark {} as {}", idempotency_key, status.as_str()))?;
        Ok(())
    }
}

#[async_trait]
impl ConfirmationJournal for SqliteJournal {
    async fn record_intent(&self, intent: NewIntent<'_>) -> Result<()> {
        debug!("Journaling intent {} for IRO {}", intent.idempotency_key, intent.iro_id);
        let now = Utc::now().timestamp_millis();
        sqlx::query(
            r#"
            INSERT INTO pending_confirmations (
                idempotency_key, iro_id, wallet_address, deposit_address, amount_sol,
                signature, status, last_error, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, NULL, ?, NULL, ?, ?);
            "#,
        )
        .bind(intent.idempotency_key)
        .bind(intent.iro_id)
        .bind(intent.wallet_address)
        .bind(intent.deposit_address)
        .bind(intent.amount_sol)
        .bind(JournalStatus::IntentCreated.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to journal purchase intent")?;
        Ok(())
    }

    async fn record_broadcast(&self, idempotency_key: &str, signature: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE pending_confirmations
            SET signature = ?, status = ?, updated_at = ?
            WHERE idempotency_key = ?;
            "#,
        )
        .bind(signature)
        .bind(JournalStatus::Broadcast.as_str())
        .bind(Utc::now().timestamp_millis())
        .bind(idempotency_key)
        .execute(&self.pool)
        .await
        .context("Failed to journal broadcast signature")?;

        if result.rows_affected() == 0 {
            anyhow::bail!("no journaled intent for key {}", idempotency_key);
        }
        Ok(())
    }

    async fn mark_confirmed(&self, idempotency_key: &str) -> Result<()> {
        self.set_status(idempotency_key, JournalStatus::Confirmed, None).await
    }

    async fn mark_failed(&self, idempotency_key: &str, error: &str) -> Result<()> {
        self.set_status(idempotency_key, JournalStatus::Failed, Some(error)).await
    }

    async fn note_error(&self, idempotency_key: &str, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE pending_confirmations SET last_error = ?, updated_at = ? WHERE idempotency_key = ?",
        )
        .bind(error)
        .bind(Utc::now().timestamp_millis())
        .bind(idempotency_key)
        .execute(&self.pool)
        .await
        .context("Failed to record confirmation error")?;
        Ok(())
    }

    async fn get(&self, idempotency_key: &str) -> Result<Option<JournalEntry>> {
        let row: Option<JournalRow> =
            sqlx::query_as("SELECT * FROM pending_confirmations WHERE idempotency_key = ?")
                .bind(idempotency_key)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to fetch journal entry")?;
        row.map(JournalEntry::try_from).transpose()
    }

    async fn pending_broadcasts(&self) -> Result<Vec<JournalEntry>> {
        let rows: Vec<JournalRow> = sqlx::query_as(
            "SELECT * FROM pending_confirmations WHERE status = ? ORDER BY created_at ASC",
        )
        .bind(JournalStatus::Broadcast.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch pending confirmations")?;
        rows.into_iter().map(JournalEntry::try_from).collect()
    }
}
