//! Reconciliation engine.
//!
//! Recovers from lost callbacks: the operator pulls the provider's bulk
//! transaction export (semicolon-delimited CSV) and runs it against open
//! intents. Classification never mutates anything; applying a match is an
//! explicit second step that goes through the settlement engine like any
//! other callback, so every invariant of the state machine holds for batch
//! recovery too.
//!
//! Export column layout (no header handling; header lines fail the amount
//! parse and are skipped): `date;provider_tx_id;partner_reference;amount;status_code`.

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::{
    CallbackChannel, IntentStatus, MatchType, NormalizedCallback, ProviderRow,
    ReconciliationMatch, ReconciliationReport,
};
use crate::error::AppError;
use crate::ports::LedgerStore;
use crate::reference::is_local_reference;
use crate::settlement::machine::amounts_match;
use crate::settlement::SettlementEngine;

const COL_DATE: usize = 0;
const COL_PROVIDER_TX: usize = 1;
const COL_REFERENCE: usize = 2;
const COL_AMOUNT: usize = 3;
const COL_STATUS: usize = 4;
const MIN_COLUMNS: usize = 5;

/// Rows parsed out of one export file, with counts of what was dropped.
#[derive(Debug, Default)]
pub struct ParsedExport {
    pub rows: Vec<ProviderRow>,
    pub skipped: usize,
    pub out_of_scope: usize,
}

/// Parse a provider export. Malformed rows (short, unparseable amount) are
/// skipped and counted, never fatal; rows referencing other partners are
/// dropped as out-of-scope.
pub fn parse_export<R: Read>(reader: R) -> ParsedExport {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut export = ParsedExport::default();
    for record in csv_reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(_) => {
                export.skipped += 1;
                continue;
            }
        };
        if record.len() < MIN_COLUMNS {
            export.skipped += 1;
            continue;
        }

        let reference = record[COL_REFERENCE].trim().to_string();
        if !is_local_reference(&reference) {
            export.out_of_scope += 1;
            continue;
        }

        let amount: BigDecimal = match record[COL_AMOUNT].trim().parse() {
            Ok(amount) => amount,
            Err(_) => {
                export.skipped += 1;
                continue;
            }
        };

        export.rows.push(ProviderRow {
            transaction_date: record[COL_DATE].trim().to_string(),
            provider_transaction_id: record[COL_PROVIDER_TX].trim().to_string(),
            reference_number: reference,
            amount,
            status_code: record[COL_STATUS].trim().to_string(),
        });
    }
    export
}

/// Classify an export batch against the ledger.
///
/// Intents for every referenced row are loaded in one query. Rows with no
/// intent are flagged `not_found` for manual investigation; amount
/// disagreements carry the signed discrepancy (provider minus intent) and
/// are never auto-applied. Open intents absent from the export come back as
/// `missing_from_provider`, the "payment never arrived" follow-up list.
pub async fn classify(
    ledger: &Arc<dyn LedgerStore>,
    export: ParsedExport,
) -> Result<ReconciliationReport, AppError> {
    let references: Vec<String> = export
        .rows
        .iter()
        .map(|row| row.reference_number.clone())
        .collect();

    let intents = ledger.intents_by_references(&references).await?;
    let by_reference: HashMap<&str, _> = intents
        .iter()
        .map(|intent| (intent.reference_number.as_str(), intent))
        .collect();

    let mut report = ReconciliationReport {
        skipped_rows: export.skipped,
        out_of_scope_rows: export.out_of_scope,
        ..Default::default()
    };

    let batch_references: HashSet<&str> = references.iter().map(String::as_str).collect();

    for row in export.rows {
        match by_reference.get(row.reference_number.as_str()) {
            None => report.not_found.push(ReconciliationMatch {
                row,
                intent_id: None,
                intent_status: None,
                intent_amount: None,
                match_type: MatchType::NotFound,
                discrepancy: None,
            }),
            Some(intent) => {
                if amounts_match(&intent.amount, &row.amount) {
                    report.exact.push(ReconciliationMatch {
                        intent_id: Some(intent.id),
                        intent_status: Some(intent.status),
                        intent_amount: Some(intent.amount.clone()),
                        match_type: MatchType::Exact,
                        discrepancy: None,
                        row,
                    });
                } else {
                    let discrepancy = &row.amount - &intent.amount;
                    report.amount_mismatch.push(ReconciliationMatch {
                        intent_id: Some(intent.id),
                        intent_status: Some(intent.status),
                        intent_amount: Some(intent.amount.clone()),
                        match_type: MatchType::AmountMismatch,
                        discrepancy: Some(discrepancy),
                        row,
                    });
                }
            }
        }
    }

    for intent in ledger.open_intents().await? {
        if !batch_references.contains(intent.reference_number.as_str()) {
            report
                .missing_from_provider
                .push(intent.reference_number.clone());
        }
    }

    Ok(report)
}

/// One operator-approved row to apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyRow {
    pub reference_number: String,
    pub provider_transaction_id: String,
    pub amount: BigDecimal,
    pub status_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResult {
    pub reference_number: String,
    pub applied: bool,
    pub duplicate: bool,
    pub status: Option<IntentStatus>,
    pub error: Option<String>,
}

/// Apply approved rows through the settlement engine, tagged `RECONCILE_`
/// in the audit log. Amounts are re-validated row by row; one bad row never
/// aborts the batch.
pub async fn apply(engine: &SettlementEngine, rows: Vec<ApplyRow>) -> Vec<ApplyResult> {
    let mut results = Vec::with_capacity(rows.len());

    for row in rows {
        results.push(apply_one(engine, row).await);
    }

    results
}

async fn apply_one(engine: &SettlementEngine, row: ApplyRow) -> ApplyResult {
    let reference = row.reference_number.clone();

    let outcome = async {
        let intent = engine.ledger().intent_by_reference(&reference).await?;
        if !amounts_match(&intent.amount, &row.amount) {
            return Err(AppError::AmountMismatch {
                reference: reference.clone(),
                expected: intent.amount.to_string(),
                received: row.amount.to_string(),
            });
        }

        let callback = NormalizedCallback {
            reference_number: reference.clone(),
            provider_transaction_id: Some(row.provider_transaction_id.clone()),
            provider_status_code: row.status_code.clone(),
        };
        let payload = json!({
            "reference_number": reference,
            "provider_transaction_id": row.provider_transaction_id,
            "amount": row.amount.to_string(),
            "status_code": row.status_code,
        });
        engine
            .apply(&callback, CallbackChannel::Reconcile, payload)
            .await
    }
    .await;

    match outcome {
        Ok(outcome) => ApplyResult {
            reference_number: row.reference_number,
            applied: !outcome.duplicate,
            duplicate: outcome.duplicate,
            status: Some(outcome.intent.status),
            error: None,
        },
        Err(err) => ApplyResult {
            reference_number: row.reference_number,
            applied: false,
            duplicate: false,
            status: None,
            error: Some(err.to_string()),
        },
    }
}
