use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ports::LedgerError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("callback payload has no resolvable reference field")]
    MissingReference,

    #[error("no intent found for reference {0}")]
    IntentNotFound(String),

    #[error("amount mismatch for {reference}: stored {expected}, received {received}")]
    AmountMismatch {
        reference: String,
        expected: String,
        received: String,
    },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingReference => StatusCode::BAD_REQUEST,
            AppError::IntentNotFound(_) => StatusCode::NOT_FOUND,
            AppError::AmountMismatch { .. } => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::LedgerUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::IntentNotFound(reference) => AppError::IntentNotFound(reference),
            LedgerError::AccountNotFound(id) => AppError::IntentNotFound(format!("account {id}")),
            LedgerError::Conflict(msg) => AppError::Conflict(msg),
            LedgerError::Unavailable(msg) => AppError::LedgerUnavailable(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
