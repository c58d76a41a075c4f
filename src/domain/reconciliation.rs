//! Reconciliation working set: provider export rows, match classification
//! and the batch report. Nothing here is persisted; applying a match goes
//! through the settlement engine like any other callback.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::intent::IntentStatus;

/// One parsed row of the provider's transaction export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRow {
    pub provider_transaction_id: String,
    pub reference_number: String,
    pub amount: BigDecimal,
    pub status_code: String,
    pub transaction_date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    AmountMismatch,
    NotFound,
}

/// Pairing of one provider row with (at most) one intent.
/// `discrepancy` is signed: provider amount minus intent amount, so a
/// positive value means the provider claims more than we booked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationMatch {
    pub row: ProviderRow,
    pub intent_id: Option<Uuid>,
    pub intent_status: Option<IntentStatus>,
    pub intent_amount: Option<BigDecimal>,
    pub match_type: MatchType,
    pub discrepancy: Option<BigDecimal>,
}

/// Outcome of classifying one export batch against open intents.
/// `missing_from_provider` lists open intent references with no provider row
/// at all ("payment never arrived" candidates), distinct from `not_found`
/// which flags provider rows with no intent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub exact: Vec<ReconciliationMatch>,
    pub amount_mismatch: Vec<ReconciliationMatch>,
    pub not_found: Vec<ReconciliationMatch>,
    pub missing_from_provider: Vec<String>,
    pub skipped_rows: usize,
    pub out_of_scope_rows: usize,
}

impl ReconciliationReport {
    pub fn total_rows_considered(&self) -> usize {
        self.exact.len() + self.amount_mismatch.len() + self.not_found.len()
    }
}
