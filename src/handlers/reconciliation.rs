//! Reconciliation endpoints: classification preview (read-only) and the
//! operator-approved apply step.

use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;

use crate::error::AppError;
use crate::services::reconcile::{self, ApplyRow};
use crate::AppState;

/// Classify a provider CSV export against the ledger. Body is the raw
/// export text; nothing is mutated.
pub async fn preview(
    State(state): State<AppState>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    let export = reconcile::parse_export(body.as_bytes());
    tracing::info!(
        rows = export.rows.len(),
        skipped = export.skipped,
        out_of_scope = export.out_of_scope,
        "reconciliation export parsed"
    );

    let report = reconcile::classify(&state.ledger, export).await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub rows: Vec<ApplyRow>,
}

/// Apply operator-approved rows. Each row goes through the settlement
/// engine; per-row failures are reported, not fatal.
pub async fn apply(
    State(state): State<AppState>,
    Json(request): Json<ApplyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let results = reconcile::apply(&state.engine, request.rows).await;
    Ok(Json(results))
}
