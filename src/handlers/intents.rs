//! Intent lifecycle endpoints: create, fetch, audit trail, cancel,
//! administrative reversal. Accounts are exposed read-only for balance
//! inspection; nothing here writes a balance.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::intent::NewIntent;
use crate::domain::{AccountType, IntentStatus, IntentType, TransactionIntent};
use crate::error::AppError;
use crate::reference;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub account_type: AccountType,
    pub intent_type: IntentType,
    pub amount: BigDecimal,
    pub payment_method: String,
    pub investment_tranche: Option<String>,
    pub investment_term: Option<String>,
    /// Clients retrying the same logical request should resend the same
    /// reference; the unique constraint collapses retries into one intent.
    pub reference_number: Option<String>,
}

pub async fn create_intent(
    State(state): State<AppState>,
    Json(request): Json<CreateIntentRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.amount <= BigDecimal::from(0) {
        return Err(AppError::Validation(
            "amount must be strictly positive".to_string(),
        ));
    }

    let reference_number = reference::resolve(
        request.reference_number.as_deref(),
        request.account_type,
        request.intent_type,
    );

    let intent = TransactionIntent::open(NewIntent {
        reference_number,
        user_id: request.user_id,
        account_id: request.account_id,
        account_type: request.account_type,
        intent_type: request.intent_type,
        amount: request.amount,
        payment_method: request.payment_method,
        investment_tranche: request.investment_tranche,
        investment_term: request.investment_term,
    });

    let intent = state.ledger.create_intent(intent).await?;
    tracing::info!(reference = %intent.reference_number, "intent created");

    Ok((StatusCode::CREATED, Json(intent)))
}

pub async fn get_intent(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let intent = state.ledger.intent_by_reference(&reference).await?;
    Ok(Json(intent))
}

pub async fn get_intent_logs(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let intent = state.ledger.intent_by_reference(&reference).await?;
    let logs = state.ledger.callback_logs(intent.id).await?;
    Ok(Json(logs))
}

pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let account = state.ledger.account(id).await?;
    Ok(Json(account))
}

#[derive(Debug, Deserialize)]
pub struct ReverseRequest {
    pub target_status: IntentStatus,
    pub reason: String,
}

pub async fn reverse_intent(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Json(request): Json<ReverseRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .engine
        .reverse(&reference, request.target_status, &request.reason)
        .await?;
    Ok(Json(outcome.intent))
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

pub async fn cancel_intent(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Json(request): Json<CancelRequest>,
) -> Result<impl IntoResponse, AppError> {
    let reason = request.reason.unwrap_or_else(|| "cancelled".to_string());
    let outcome = state.engine.cancel(&reference, &reason).await?;
    Ok(Json(outcome.intent))
}
