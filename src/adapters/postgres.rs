//! Postgres ledger adapter.
//!
//! Atomicity contract: `settle`, `reverse` and `cancel` run in one database
//! transaction and take `SELECT ... FOR UPDATE` on the **account** row, not
//! the intent, so two intents settling against the same account serialize
//! while different accounts proceed in parallel. The intent is re-read
//! after the account lock is held, which is what turns a concurrent
//! duplicate delivery into the idempotent short-circuit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction as PgTransaction};
use uuid::Uuid;

use crate::domain::{
    CallbackChannel, IntentStatus, PaymentCallbackLog, TransactionIntent, UserAccount,
};
use crate::ports::{
    LedgerError, LedgerResult, LedgerStore, SettlementOutcome, SettlementRequest,
};
use crate::settlement::machine::{self, Decision};

#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row types. Enum columns are TEXT in the schema and parsed at
/// the adapter boundary; nothing outside this file sees raw strings.
#[derive(Debug, sqlx::FromRow)]
struct IntentRow {
    id: Uuid,
    reference_number: String,
    user_id: Uuid,
    account_id: Uuid,
    account_type: String,
    intent_type: String,
    amount: bigdecimal::BigDecimal,
    payment_method: String,
    investment_tranche: Option<String>,
    investment_term: Option<String>,
    status: String,
    failure_reason: Option<String>,
    provider_transaction_id: Option<String>,
    provider_status: Option<String>,
    last_callback_at: Option<DateTime<Utc>>,
    last_callback_payload: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl IntentRow {
    fn into_domain(self) -> LedgerResult<TransactionIntent> {
        Ok(TransactionIntent {
            id: self.id,
            reference_number: self.reference_number,
            user_id: self.user_id,
            account_id: self.account_id,
            account_type: self
                .account_type
                .parse()
                .map_err(LedgerError::Unavailable)?,
            intent_type: self.intent_type.parse().map_err(LedgerError::Unavailable)?,
            amount: self.amount,
            payment_method: self.payment_method,
            investment_tranche: self.investment_tranche,
            investment_term: self.investment_term,
            status: self.status.parse().map_err(LedgerError::Unavailable)?,
            failure_reason: self.failure_reason,
            provider_transaction_id: self.provider_transaction_id,
            provider_status: self.provider_status,
            last_callback_at: self.last_callback_at,
            last_callback_payload: self.last_callback_payload,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    user_id: Uuid,
    account_type: String,
    balance: bigdecimal::BigDecimal,
    locked_until: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_domain(self) -> LedgerResult<UserAccount> {
        Ok(UserAccount {
            id: self.id,
            user_id: self.user_id,
            account_type: self
                .account_type
                .parse()
                .map_err(LedgerError::Unavailable)?,
            balance: self.balance,
            locked_until: self.locked_until,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LogRow {
    id: Uuid,
    transaction_intent_id: Uuid,
    status: String,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
}

/// Load intent + account with the account row locked, in a fixed order.
async fn lock_intent(
    tx: &mut PgTransaction<'_, Postgres>,
    reference: &str,
) -> LedgerResult<(TransactionIntent, UserAccount)> {
    let head: Option<(Uuid, Uuid)> = sqlx::query_as(
        "SELECT id, account_id FROM transaction_intents WHERE reference_number = $1",
    )
    .bind(reference)
    .fetch_optional(&mut **tx)
    .await?;

    let (intent_id, account_id) =
        head.ok_or_else(|| LedgerError::IntentNotFound(reference.to_string()))?;

    let account: AccountRow =
        sqlx::query_as("SELECT * FROM user_accounts WHERE id = $1 FOR UPDATE")
            .bind(account_id)
            .fetch_one(&mut **tx)
            .await?;

    // Re-read under the lock: a concurrent settle on the same account has
    // committed by the time we get here, so its status change is visible.
    let intent: IntentRow = sqlx::query_as("SELECT * FROM transaction_intents WHERE id = $1")
        .bind(intent_id)
        .fetch_one(&mut **tx)
        .await?;

    Ok((intent.into_domain()?, account.into_domain()?))
}

async fn persist_decision(
    tx: &mut PgTransaction<'_, Postgres>,
    intent: &TransactionIntent,
    decision: &Decision,
    request: Option<&SettlementRequest>,
    reason: Option<&str>,
) -> LedgerResult<()> {
    let failure_reason = decision
        .failure_reason
        .map(str::to_string)
        .or_else(|| reason.map(str::to_string));

    match request {
        Some(request) => {
            sqlx::query(
                r#"
                UPDATE transaction_intents
                SET status = $1,
                    failure_reason = COALESCE($2, failure_reason),
                    provider_transaction_id = COALESCE(provider_transaction_id, $3),
                    provider_status = $4,
                    last_callback_at = NOW(),
                    last_callback_payload = $5,
                    updated_at = NOW()
                WHERE id = $6
                "#,
            )
            .bind(decision.next_status.as_str())
            .bind(&failure_reason)
            .bind(&request.provider_transaction_id)
            .bind(&request.provider_status_code)
            .bind(&request.payload)
            .bind(intent.id)
            .execute(&mut **tx)
            .await?;
        }
        None => {
            sqlx::query(
                r#"
                UPDATE transaction_intents
                SET status = $1,
                    failure_reason = COALESCE($2, failure_reason),
                    updated_at = NOW()
                WHERE id = $3
                "#,
            )
            .bind(decision.next_status.as_str())
            .bind(&failure_reason)
            .bind(intent.id)
            .execute(&mut **tx)
            .await?;
        }
    }

    if decision.balance_delta != bigdecimal::BigDecimal::from(0) {
        sqlx::query(
            "UPDATE user_accounts SET balance = balance + $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(&decision.balance_delta)
        .bind(intent.account_id)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

async fn append_log(
    tx: &mut PgTransaction<'_, Postgres>,
    log: &PaymentCallbackLog,
) -> LedgerResult<()> {
    sqlx::query(
        r#"
        INSERT INTO payment_callback_logs (id, transaction_intent_id, status, payload, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(log.id)
    .bind(log.transaction_intent_id)
    .bind(&log.status)
    .bind(&log.payload)
    .bind(log.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn reload_intent(
    tx: &mut PgTransaction<'_, Postgres>,
    id: Uuid,
) -> LedgerResult<TransactionIntent> {
    let row: IntentRow = sqlx::query_as("SELECT * FROM transaction_intents WHERE id = $1")
        .bind(id)
        .fetch_one(&mut **tx)
        .await?;
    row.into_domain()
}

#[async_trait]
impl LedgerStore for PostgresLedger {
    async fn create_account(&self, account: UserAccount) -> LedgerResult<UserAccount> {
        sqlx::query(
            r#"
            INSERT INTO user_accounts (id, user_id, account_type, balance, locked_until, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(account.id)
        .bind(account.user_id)
        .bind(account.account_type.as_str())
        .bind(&account.balance)
        .bind(account.locked_until)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(account)
    }

    async fn account(&self, id: Uuid) -> LedgerResult<UserAccount> {
        let row: Option<AccountRow> = sqlx::query_as("SELECT * FROM user_accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or(LedgerError::AccountNotFound(id))?.into_domain()
    }

    async fn create_intent(&self, intent: TransactionIntent) -> LedgerResult<TransactionIntent> {
        sqlx::query(
            r#"
            INSERT INTO transaction_intents (
                id, reference_number, user_id, account_id, account_type, intent_type,
                amount, payment_method, investment_tranche, investment_term, status,
                failure_reason, provider_transaction_id, provider_status,
                last_callback_at, last_callback_payload, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(intent.id)
        .bind(&intent.reference_number)
        .bind(intent.user_id)
        .bind(intent.account_id)
        .bind(intent.account_type.as_str())
        .bind(intent.intent_type.as_str())
        .bind(&intent.amount)
        .bind(&intent.payment_method)
        .bind(&intent.investment_tranche)
        .bind(&intent.investment_term)
        .bind(intent.status.as_str())
        .bind(&intent.failure_reason)
        .bind(&intent.provider_transaction_id)
        .bind(&intent.provider_status)
        .bind(intent.last_callback_at)
        .bind(&intent.last_callback_payload)
        .bind(intent.created_at)
        .bind(intent.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(intent)
    }

    async fn intent_by_reference(&self, reference: &str) -> LedgerResult<TransactionIntent> {
        let row: Option<IntentRow> =
            sqlx::query_as("SELECT * FROM transaction_intents WHERE reference_number = $1")
                .bind(reference)
                .fetch_optional(&self.pool)
                .await?;
        row.ok_or_else(|| LedgerError::IntentNotFound(reference.to_string()))?
            .into_domain()
    }

    async fn intents_by_references(
        &self,
        references: &[String],
    ) -> LedgerResult<Vec<TransactionIntent>> {
        let rows: Vec<IntentRow> =
            sqlx::query_as("SELECT * FROM transaction_intents WHERE reference_number = ANY($1)")
                .bind(references)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(IntentRow::into_domain).collect()
    }

    async fn open_intents(&self) -> LedgerResult<Vec<TransactionIntent>> {
        let rows: Vec<IntentRow> = sqlx::query_as(
            "SELECT * FROM transaction_intents WHERE status IN ('PENDING', 'PROCESSING') ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(IntentRow::into_domain).collect()
    }

    async fn callback_logs(&self, intent_id: Uuid) -> LedgerResult<Vec<PaymentCallbackLog>> {
        let rows: Vec<LogRow> = sqlx::query_as(
            "SELECT * FROM payment_callback_logs WHERE transaction_intent_id = $1 ORDER BY created_at",
        )
        .bind(intent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| PaymentCallbackLog {
                id: row.id,
                transaction_intent_id: row.transaction_intent_id,
                status: row.status,
                payload: row.payload,
                created_at: row.created_at,
            })
            .collect())
    }

    async fn settle(
        &self,
        reference: &str,
        request: SettlementRequest,
    ) -> LedgerResult<SettlementOutcome> {
        let mut tx = self.pool.begin().await?;

        let (intent, account) = lock_intent(&mut tx, reference).await?;
        let previous_status = intent.status;
        let decision = machine::decide(
            &intent,
            &account,
            request.outcome,
            request.provider_transaction_id.as_deref(),
        );

        if !decision.duplicate {
            persist_decision(&mut tx, &intent, &decision, Some(&request), None).await?;
        }

        append_log(
            &mut tx,
            &PaymentCallbackLog::record(
                intent.id,
                request.channel,
                decision.log_label(),
                request.payload.clone(),
            ),
        )
        .await?;

        let updated = if decision.duplicate {
            intent
        } else {
            reload_intent(&mut tx, intent.id).await?
        };

        tx.commit().await?;

        Ok(SettlementOutcome {
            fresh_completion: decision.fresh_completion,
            duplicate: decision.duplicate,
            previous_status,
            intent: updated,
        })
    }

    async fn reverse(
        &self,
        reference: &str,
        target: IntentStatus,
        reason: &str,
    ) -> LedgerResult<SettlementOutcome> {
        let mut tx = self.pool.begin().await?;

        let (intent, account) = lock_intent(&mut tx, reference).await?;
        let previous_status = intent.status;
        let decision = machine::decide_reversal(&intent, &account, target)
            .map_err(|e| LedgerError::Conflict(e.to_string()))?;

        persist_decision(&mut tx, &intent, &decision, None, Some(reason)).await?;
        append_log(
            &mut tx,
            &PaymentCallbackLog::record(
                intent.id,
                CallbackChannel::Manual,
                &format!("REVERSED_TO_{}", target.as_str()),
                serde_json::json!({ "reason": reason }),
            ),
        )
        .await?;

        let updated = reload_intent(&mut tx, intent.id).await?;
        tx.commit().await?;

        Ok(SettlementOutcome {
            fresh_completion: false,
            duplicate: false,
            previous_status,
            intent: updated,
        })
    }

    async fn cancel(&self, reference: &str, reason: &str) -> LedgerResult<SettlementOutcome> {
        let mut tx = self.pool.begin().await?;

        let (intent, _account) = lock_intent(&mut tx, reference).await?;
        let previous_status = intent.status;
        let decision =
            machine::decide_cancel(&intent).map_err(|e| LedgerError::Conflict(e.to_string()))?;

        persist_decision(&mut tx, &intent, &decision, None, Some(reason)).await?;
        append_log(
            &mut tx,
            &PaymentCallbackLog::record(
                intent.id,
                CallbackChannel::Manual,
                "CANCELLED",
                serde_json::json!({ "reason": reason }),
            ),
        )
        .await?;

        let updated = reload_intent(&mut tx, intent.id).await?;
        tx.commit().await?;

        Ok(SettlementOutcome {
            fresh_completion: false,
            duplicate: false,
            previous_status,
            intent: updated,
        })
    }
}
