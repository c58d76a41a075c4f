//! Settlement engine: the one entry point all three channels feed.
//!
//! Thin by design. Parsing lives in the channel adapters, decisions in
//! [`super::machine`], atomicity in the ledger adapters; this type wires
//! them together and owns the only call site of the confirmation notifier.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::{CallbackChannel, IntentStatus, NormalizedCallback, TransactionIntent};
use crate::error::AppError;
use crate::ports::{LedgerStore, Notifier, SettlementOutcome, SettlementRequest};
use crate::status;

pub struct SettlementEngine {
    ledger: Arc<dyn LedgerStore>,
    notifier: Arc<dyn Notifier>,
}

impl SettlementEngine {
    pub fn new(ledger: Arc<dyn LedgerStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { ledger, notifier }
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerStore> {
        &self.ledger
    }

    /// Apply one normalized callback through the state machine.
    ///
    /// Safe to re-invoke with identical input: a duplicate delivery settles
    /// as an audited no-op, and the notification fires only on the first
    /// transition into COMPLETED.
    pub async fn apply(
        &self,
        callback: &NormalizedCallback,
        channel: CallbackChannel,
        payload: Value,
    ) -> Result<SettlementOutcome, AppError> {
        let outcome = status::map_provider_code(&callback.provider_status_code);
        let request = SettlementRequest {
            outcome,
            provider_transaction_id: callback.provider_transaction_id.clone(),
            provider_status_code: callback.provider_status_code.clone(),
            channel,
            payload,
        };

        let result = self
            .ledger
            .settle(&callback.reference_number, request)
            .await?;

        if result.duplicate {
            tracing::info!(
                reference = %callback.reference_number,
                channel = ?channel,
                "duplicate delivery ignored"
            );
        } else {
            tracing::info!(
                reference = %callback.reference_number,
                channel = ?channel,
                from = %result.previous_status,
                to = %result.intent.status,
                "intent settled"
            );
        }

        if result.fresh_completion {
            self.notify_completed(&result.intent).await;
        }

        Ok(result)
    }

    /// Administrative reversal of a completed intent.
    pub async fn reverse(
        &self,
        reference: &str,
        target: IntentStatus,
        reason: &str,
    ) -> Result<SettlementOutcome, AppError> {
        let result = self.ledger.reverse(reference, target, reason).await?;
        tracing::warn!(
            reference = %reference,
            to = %target,
            reason = %reason,
            "intent administratively reversed"
        );
        Ok(result)
    }

    /// Cancel an intent that has not settled.
    pub async fn cancel(&self, reference: &str, reason: &str) -> Result<SettlementOutcome, AppError> {
        let result = self.ledger.cancel(reference, reason).await?;
        tracing::info!(reference = %reference, "intent cancelled");
        Ok(result)
    }

    async fn notify_completed(&self, intent: &TransactionIntent) {
        self.notifier.intent_completed(intent).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryLedger;
    use crate::domain::intent::NewIntent;
    use crate::domain::{AccountType, IntentType, UserAccount};
    use crate::domain::TransactionIntent;
    use async_trait::async_trait;
    use bigdecimal::BigDecimal;
    use serde_json::json;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct RecordingNotifier {
        completed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn intent_completed(&self, intent: &TransactionIntent) {
            self.completed
                .lock()
                .unwrap()
                .push(intent.reference_number.clone());
        }
    }

    async fn engine_with_intent() -> (SettlementEngine, Arc<RecordingNotifier>, String) {
        let ledger = Arc::new(MemoryLedger::new());
        let account = UserAccount::new(Uuid::new_v4(), AccountType::SamaNaffa);
        let account = ledger.create_account(account).await.unwrap();
        let intent = TransactionIntent::open(NewIntent {
            reference_number: "SAMA-NAFFA-DEPOSIT-1700000000-ENG001".to_string(),
            user_id: account.user_id,
            account_id: account.id,
            account_type: AccountType::SamaNaffa,
            intent_type: IntentType::Deposit,
            amount: BigDecimal::from(10_000),
            payment_method: "intouch".to_string(),
            investment_tranche: None,
            investment_term: None,
        });
        let intent = ledger.create_intent(intent).await.unwrap();
        let notifier = Arc::new(RecordingNotifier {
            completed: Mutex::new(Vec::new()),
        });
        let engine = SettlementEngine::new(ledger, notifier.clone());
        (engine, notifier, intent.reference_number)
    }

    fn callback(reference: &str, code: &str) -> NormalizedCallback {
        NormalizedCallback {
            reference_number: reference.to_string(),
            provider_transaction_id: Some("GU-1".to_string()),
            provider_status_code: code.to_string(),
        }
    }

    #[tokio::test]
    async fn notifies_once_on_fresh_completion_only() {
        let (engine, notifier, reference) = engine_with_intent().await;

        let first = engine
            .apply(&callback(&reference, "200"), CallbackChannel::Webhook, json!({}))
            .await
            .unwrap();
        assert!(first.fresh_completion);

        let second = engine
            .apply(&callback(&reference, "200"), CallbackChannel::Manual, json!({}))
            .await
            .unwrap();
        assert!(second.duplicate);
        assert!(!second.fresh_completion);

        assert_eq!(notifier.completed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_settlement_does_not_notify() {
        let (engine, notifier, reference) = engine_with_intent().await;

        let outcome = engine
            .apply(&callback(&reference, "420"), CallbackChannel::Webhook, json!({}))
            .await
            .unwrap();
        assert_eq!(outcome.intent.status, IntentStatus::Failed);
        assert!(notifier.completed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_reference_is_not_found() {
        let (engine, _, _) = engine_with_intent().await;
        let err = engine
            .apply(
                &callback("SAMA-NAFFA-DEPOSIT-1-NOPE", "200"),
                CallbackChannel::Webhook,
                json!({}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::IntentNotFound(_)));
    }
}
