//! Provider webhook endpoint.
//!
//! The provider delivers the same notification over GET (query string) and
//! POST (JSON or form-urlencoded, with a Content-Type that cannot be
//! trusted), and retries on non-2xx. The response code signals the
//! settlement outcome back: 200 for a completed (or already-completed)
//! intent, 420 for any other settled outcome, which is this provider's
//! convention rather than a real HTTP error.

use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::domain::{CallbackChannel, IntentStatus};
use crate::error::AppError;
use crate::normalizer::{self, WirePayload};
use crate::AppState;

/// Provider convention for "settled, not successful".
const PROVIDER_REJECT_CODE: u16 = 420;

pub async fn callback(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let payload = if body.is_empty() {
        WirePayload::from_query(query.as_deref().unwrap_or(""))
    } else {
        WirePayload::from_body(&body)
    };

    let callback = normalizer::normalize(&payload)?;
    tracing::info!(
        reference = %callback.reference_number,
        code = %callback.provider_status_code,
        "provider callback received"
    );

    let outcome = state
        .engine
        .apply(&callback, CallbackChannel::Webhook, payload.raw().clone())
        .await?;

    let settled_ok = outcome.intent.status == IntentStatus::Completed;
    let status = if settled_ok {
        StatusCode::OK
    } else {
        StatusCode::from_u16(PROVIDER_REJECT_CODE).unwrap_or(StatusCode::BAD_REQUEST)
    };

    Ok((
        status,
        Json(json!({
            "reference_number": outcome.intent.reference_number,
            "status": outcome.intent.status,
            "duplicate": outcome.duplicate,
        })),
    ))
}
