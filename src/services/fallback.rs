//! Manual fallback resolver.
//!
//! Webhook delivery is unreliable (network, firewalls, provider
//! misconfiguration). When the user lands back on the redirect page and the
//! intent is still open, the redirect's query parameters carry enough to
//! settle. This is deliberately a second path into the same state machine,
//! never an independent ledger mutation.

use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::json;

use crate::domain::{CallbackChannel, IntentStatus, NormalizedCallback};
use crate::error::AppError;
use crate::ports::SettlementOutcome;
use crate::settlement::SettlementEngine;

/// Query parameters the provider appends to the return redirect.
#[derive(Debug, Clone, Deserialize)]
pub struct FallbackParams {
    #[serde(rename = "referenceNumber")]
    pub reference_number: String,
    #[serde(rename = "errorCode")]
    pub error_code: String,
    #[serde(rename = "num_transaction_from_gu")]
    pub provider_transaction_id: Option<String>,
    pub amount: Option<BigDecimal>,
}

/// Re-derive settlement from redirect parameters.
///
/// Checks, in order: already-completed first (a redirect replay after the
/// webhook is a duplicate whatever its parameters claim), then exact
/// amount agreement against the stored intent (the stored amount is
/// authoritative; a mismatch is a hard error, never a silent override),
/// then the shared status table and engine. The replay still goes through
/// the engine so the delivery is audited like every other one.
pub async fn resolve(
    engine: &SettlementEngine,
    params: FallbackParams,
) -> Result<SettlementOutcome, AppError> {
    let intent = engine
        .ledger()
        .intent_by_reference(&params.reference_number)
        .await?;

    if intent.status != IntentStatus::Completed {
        if let Some(amount) = &params.amount {
            if *amount != intent.amount {
                return Err(AppError::AmountMismatch {
                    reference: params.reference_number.clone(),
                    expected: intent.amount.to_string(),
                    received: amount.to_string(),
                });
            }
        }
    }

    let callback = NormalizedCallback {
        reference_number: params.reference_number.clone(),
        provider_transaction_id: params.provider_transaction_id.clone(),
        provider_status_code: params.error_code.clone(),
    };
    let payload = json!({
        "referenceNumber": params.reference_number,
        "errorCode": params.error_code,
        "num_transaction_from_gu": params.provider_transaction_id,
        "amount": params.amount.as_ref().map(|a| a.to_string()),
    });

    engine.apply(&callback, CallbackChannel::Manual, payload).await
}
