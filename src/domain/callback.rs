//! Normalized callbacks and the append-only callback audit log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical form of a provider notification, whatever transport and field
/// vocabulary it arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedCallback {
    pub reference_number: String,
    pub provider_transaction_id: Option<String>,
    pub provider_status_code: String,
}

/// Which of the three settlement channels produced an event. The tag prefix
/// ends up in the audit log so duplicate deliveries and their origin can be
/// reconstructed after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackChannel {
    Webhook,
    Manual,
    Reconcile,
}

impl CallbackChannel {
    pub fn log_prefix(&self) -> &'static str {
        match self {
            CallbackChannel::Webhook => "",
            CallbackChannel::Manual => "MANUAL_",
            CallbackChannel::Reconcile => "RECONCILE_",
        }
    }
}

/// Append-only audit record, one per delivery attempt. Never mutated or
/// deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCallbackLog {
    pub id: Uuid,
    pub transaction_intent_id: Uuid,
    pub status: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl PaymentCallbackLog {
    pub fn record(
        transaction_intent_id: Uuid,
        channel: CallbackChannel,
        label: &str,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_intent_id,
            status: format!("{}{}", channel.log_prefix(), label),
            payload,
            created_at: Utc::now(),
        }
    }
}
