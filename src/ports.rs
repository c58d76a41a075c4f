//! Storage and collaborator ports.
//!
//! The settlement engine talks to the ledger through [`LedgerStore`] so the
//! same state machine runs against Postgres in production and the in-memory
//! adapter in tests. Adapters own atomicity: `settle`, `reverse` and
//! `cancel` must execute load-decide-apply-log as one unit, serialized per
//! account.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    CallbackChannel, IntentStatus, PaymentCallbackLog, TransactionIntent, UserAccount,
};
use crate::status::ProviderOutcome;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("no intent found for reference {0}")]
    IntentNotFound(String),

    #[error("no account found with id {0}")]
    AccountNotFound(Uuid),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                LedgerError::Conflict(db.message().to_string())
            }
            _ => LedgerError::Unavailable(err.to_string()),
        }
    }
}

/// One normalized settlement event, ready to be applied under the account
/// lock. `payload` is the raw delivery, kept for the audit log.
#[derive(Debug, Clone)]
pub struct SettlementRequest {
    pub outcome: ProviderOutcome,
    pub provider_transaction_id: Option<String>,
    pub provider_status_code: String,
    pub channel: CallbackChannel,
    pub payload: Value,
}

/// What a settlement (or reversal/cancel) call did.
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub intent: TransactionIntent,
    pub previous_status: IntentStatus,
    /// The idempotent short-circuit was hit; nothing changed.
    pub duplicate: bool,
    /// This call transitioned the intent into COMPLETED. Notification fires
    /// only when this is set.
    pub fresh_completion: bool,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn create_account(&self, account: UserAccount) -> LedgerResult<UserAccount>;

    async fn account(&self, id: Uuid) -> LedgerResult<UserAccount>;

    async fn create_intent(&self, intent: TransactionIntent) -> LedgerResult<TransactionIntent>;

    async fn intent_by_reference(&self, reference: &str) -> LedgerResult<TransactionIntent>;

    /// Intents matching any of the given references, whatever their status.
    /// One query; reconciliation batches can be large.
    async fn intents_by_references(
        &self,
        references: &[String],
    ) -> LedgerResult<Vec<TransactionIntent>>;

    /// All PENDING/PROCESSING intents.
    async fn open_intents(&self) -> LedgerResult<Vec<TransactionIntent>>;

    async fn callback_logs(&self, intent_id: Uuid) -> LedgerResult<Vec<PaymentCallbackLog>>;

    /// Apply one settlement event atomically under the account lock.
    async fn settle(
        &self,
        reference: &str,
        request: SettlementRequest,
    ) -> LedgerResult<SettlementOutcome>;

    /// Administrative reversal of a COMPLETED intent to `target`, undoing
    /// the balance effect. Fails with `Conflict` when the intent is not
    /// COMPLETED, the target is not terminal-negative, or the reversal
    /// would drive the balance negative.
    async fn reverse(
        &self,
        reference: &str,
        target: IntentStatus,
        reason: &str,
    ) -> LedgerResult<SettlementOutcome>;

    /// Cancel an intent that has not settled yet (no balance effect).
    async fn cancel(&self, reference: &str, reason: &str) -> LedgerResult<SettlementOutcome>;
}

/// Confirmation-notification collaborator. Delivery is fire-and-forget;
/// failures are logged, never propagated into settlement.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn intent_completed(&self, intent: &TransactionIntent);
}
