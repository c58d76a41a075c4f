//! Manual-fallback redirect target.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::error::AppError;
use crate::services::fallback::{self, FallbackParams};
use crate::AppState;

pub async fn payment_return(
    State(state): State<AppState>,
    Query(params): Query<FallbackParams>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(
        reference = %params.reference_number,
        code = %params.error_code,
        "manual fallback invoked"
    );

    let outcome = fallback::resolve(&state.engine, params).await?;

    Ok(Json(json!({
        "reference_number": outcome.intent.reference_number,
        "status": outcome.intent.status,
        "duplicate": outcome.duplicate,
    })))
}
