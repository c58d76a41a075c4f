//! In-memory ledger adapter.
//!
//! Used by the test suite and for local development without Postgres. One
//! async mutex guards the whole ledger, which is a coarser grain than the
//! per-account row lock the Postgres adapter takes but gives the same
//! serialization guarantee.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{
    CallbackChannel, IntentStatus, PaymentCallbackLog, TransactionIntent, UserAccount,
};
use crate::ports::{
    LedgerError, LedgerResult, LedgerStore, SettlementOutcome, SettlementRequest,
};
use crate::settlement::machine::{self, Decision};

#[derive(Default)]
struct State {
    accounts: HashMap<Uuid, UserAccount>,
    // Keyed by reference number: the external join key is also the natural
    // lookup key everywhere in the engine.
    intents: HashMap<String, TransactionIntent>,
    logs: Vec<PaymentCallbackLog>,
}

#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<State>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply_decision(
    intent: &mut TransactionIntent,
    account: &mut UserAccount,
    decision: &Decision,
    request: Option<&SettlementRequest>,
    reason: Option<&str>,
) {
    let now = Utc::now();
    intent.status = decision.next_status;
    if let Some(reason) = decision.failure_reason.map(str::to_string).or_else(|| reason.map(str::to_string)) {
        intent.failure_reason = Some(reason);
    }
    if let Some(request) = request {
        if intent.provider_transaction_id.is_none() {
            intent.provider_transaction_id = request.provider_transaction_id.clone();
        }
        intent.provider_status = Some(request.provider_status_code.clone());
        intent.last_callback_at = Some(now);
        intent.last_callback_payload = Some(request.payload.clone());
    }
    intent.updated_at = now;

    if decision.balance_delta != bigdecimal::BigDecimal::from(0) {
        account.balance = &account.balance + &decision.balance_delta;
        account.updated_at = now;
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn create_account(&self, account: UserAccount) -> LedgerResult<UserAccount> {
        let mut state = self.state.lock().await;
        if state
            .accounts
            .values()
            .any(|a| a.user_id == account.user_id && a.account_type == account.account_type)
        {
            return Err(LedgerError::Conflict(format!(
                "account already exists for user {} / {}",
                account.user_id,
                account.account_type.as_str()
            )));
        }
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn account(&self, id: Uuid) -> LedgerResult<UserAccount> {
        let state = self.state.lock().await;
        state
            .accounts
            .get(&id)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(id))
    }

    async fn create_intent(&self, intent: TransactionIntent) -> LedgerResult<TransactionIntent> {
        let mut state = self.state.lock().await;
        if !state.accounts.contains_key(&intent.account_id) {
            return Err(LedgerError::AccountNotFound(intent.account_id));
        }
        if state.intents.contains_key(&intent.reference_number) {
            return Err(LedgerError::Conflict(format!(
                "reference {} already exists",
                intent.reference_number
            )));
        }
        state
            .intents
            .insert(intent.reference_number.clone(), intent.clone());
        Ok(intent)
    }

    async fn intent_by_reference(&self, reference: &str) -> LedgerResult<TransactionIntent> {
        let state = self.state.lock().await;
        state
            .intents
            .get(reference)
            .cloned()
            .ok_or_else(|| LedgerError::IntentNotFound(reference.to_string()))
    }

    async fn intents_by_references(
        &self,
        references: &[String],
    ) -> LedgerResult<Vec<TransactionIntent>> {
        let state = self.state.lock().await;
        Ok(references
            .iter()
            .filter_map(|reference| state.intents.get(reference).cloned())
            .collect())
    }

    async fn open_intents(&self) -> LedgerResult<Vec<TransactionIntent>> {
        let state = self.state.lock().await;
        Ok(state
            .intents
            .values()
            .filter(|intent| !intent.status.is_terminal())
            .cloned()
            .collect())
    }

    async fn callback_logs(&self, intent_id: Uuid) -> LedgerResult<Vec<PaymentCallbackLog>> {
        let state = self.state.lock().await;
        Ok(state
            .logs
            .iter()
            .filter(|log| log.transaction_intent_id == intent_id)
            .cloned()
            .collect())
    }

    async fn settle(
        &self,
        reference: &str,
        request: SettlementRequest,
    ) -> LedgerResult<SettlementOutcome> {
        let mut state = self.state.lock().await;

        let intent = state
            .intents
            .get(reference)
            .cloned()
            .ok_or_else(|| LedgerError::IntentNotFound(reference.to_string()))?;
        let account = state
            .accounts
            .get(&intent.account_id)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(intent.account_id))?;

        let previous_status = intent.status;
        let decision = machine::decide(
            &intent,
            &account,
            request.outcome,
            request.provider_transaction_id.as_deref(),
        );

        let mut updated = intent.clone();
        if !decision.duplicate {
            let mut updated_account = account.clone();
            apply_decision(
                &mut updated,
                &mut updated_account,
                &decision,
                Some(&request),
                None,
            );
            state.accounts.insert(updated_account.id, updated_account);
            state.intents.insert(reference.to_string(), updated.clone());
        }

        state.logs.push(PaymentCallbackLog::record(
            updated.id,
            request.channel,
            decision.log_label(),
            request.payload.clone(),
        ));

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
        let mut state = self.state.lock().await;

        let intent = state
            .intents
            .get(reference)
            .cloned()
            .ok_or_else(|| LedgerError::IntentNotFound(reference.to_string()))?;
        let account = state
            .accounts
            .get(&intent.account_id)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(intent.account_id))?;

        let previous_status = intent.status;
        let decision = machine::decide_reversal(&intent, &account, target)
            .map_err(|e| LedgerError::Conflict(e.to_string()))?;

        let mut updated = intent.clone();
        let mut updated_account = account.clone();
        apply_decision(&mut updated, &mut updated_account, &decision, None, Some(reason));
        state.accounts.insert(updated_account.id, updated_account);
        state.intents.insert(reference.to_string(), updated.clone());

        state.logs.push(PaymentCallbackLog::record(
            updated.id,
            CallbackChannel::Manual,
            &format!("REVERSED_TO_{}", target.as_str()),
            serde_json::json!({ "reason": reason }),
        ));

        Ok(SettlementOutcome {
            fresh_completion: false,
            duplicate: false,
            previous_status,
            intent: updated,
        })
    }

    async fn cancel(&self, reference: &str, reason: &str) -> LedgerResult<SettlementOutcome> {
        let mut state = self.state.lock().await;

        let intent = state
            .intents
            .get(reference)
            .cloned()
            .ok_or_else(|| LedgerError::IntentNotFound(reference.to_string()))?;
        let account = state
            .accounts
            .get(&intent.account_id)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(intent.account_id))?;

        let previous_status = intent.status;
        let decision =
            machine::decide_cancel(&intent).map_err(|e| LedgerError::Conflict(e.to_string()))?;

        let mut updated = intent.clone();
        let mut updated_account = account.clone();
        apply_decision(&mut updated, &mut updated_account, &decision, None, Some(reason));
        state.accounts.insert(updated_account.id, updated_account);
        state.intents.insert(reference.to_string(), updated.clone());

        state.logs.push(PaymentCallbackLog::record(
            updated.id,
            CallbackChannel::Manual,
            "CANCELLED",
            serde_json::json!({ "reason": reason }),
        ));

        Ok(SettlementOutcome {
            fresh_completion: false,
            duplicate: false,
            previous_status,
            intent: updated,
        })
    }
}
