//! Confirmation-notification collaborator.
//!
//! Settlement only needs to tell the notification system that an intent
//! completed; composing and delivering the user-facing message happens
//! elsewhere. Delivery failures are logged and swallowed: a notification
//! must never fail or duplicate a settlement.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::domain::TransactionIntent;
use crate::ports::Notifier;

/// POSTs completion events to a downstream notification endpoint.
pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpNotifier {
    pub fn new(endpoint: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, endpoint }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn intent_completed(&self, intent: &TransactionIntent) {
        let body = json!({
            "event": "intent_completed",
            "reference_number": intent.reference_number,
            "intent_type": intent.intent_type,
            "amount": intent.amount.to_string(),
            "user_id": intent.user_id,
            "provider_transaction_id": intent.provider_transaction_id,
        });

        match self.client.post(&self.endpoint).json(&body).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(reference = %intent.reference_number, "completion notification sent");
            }
            Ok(response) => {
                tracing::warn!(
                    reference = %intent.reference_number,
                    status = %response.status(),
                    "completion notification rejected"
                );
            }
            Err(err) => {
                tracing::warn!(
                    reference = %intent.reference_number,
                    error = %err,
                    "completion notification failed"
                );
            }
        }
    }
}

/// Used when no notification endpoint is configured, and by tests.
#[derive(Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn intent_completed(&self, _intent: &TransactionIntent) {}
}
