//! Reconciliation channel: CSV classification and the operator-approved
//! apply step, which must behave exactly like a callback.

mod common;

use bigdecimal::BigDecimal;
use serde_json::json;

use common::*;
use naffa_core::domain::IntentType;

const EXPORT: &str = "\
2024-05-01;GU-100;SAMA-NAFFA-DEPOSIT-1700000000-RCN001;10000;200
2024-05-01;GU-101;APE-INVESTMENT-1700000000-RCN002;50000;200
2024-05-02;GU-102;SAMA-NAFFA-DEPOSIT-1700000000-GHOST;7000;200
2024-05-02;GU-103;OTHERPARTNER-REF;3000;200
bad;row
";

#[tokio::test]
async fn preview_classifies_without_mutating() {
    let TestApp { app, ledger } = test_app();
    let account = seed_account(&ledger, 0).await;
    seed_intent(
        &ledger,
        &account,
        IntentType::Deposit,
        10_000,
        "SAMA-NAFFA-DEPOSIT-1700000000-RCN001",
    )
    .await;
    // Amount disagrees with the provider row (50000 vs 45000).
    seed_intent(
        &ledger,
        &account,
        IntentType::Investment,
        45_000,
        "APE-INVESTMENT-1700000000-RCN002",
    )
    .await;
    // Open intent with no provider row at all.
    seed_intent(
        &ledger,
        &account,
        IntentType::Deposit,
        2_000,
        "SAMA-NAFFA-DEPOSIT-1700000000-RCN003",
    )
    .await;

    let (status, report) = post_text(&app, "/reconciliation/preview", EXPORT).await;
    assert_eq!(status, 200);

    assert_eq!(report["exact"].as_array().unwrap().len(), 1);
    assert_eq!(
        report["exact"][0]["row"]["reference_number"],
        "SAMA-NAFFA-DEPOSIT-1700000000-RCN001"
    );

    let mismatch = &report["amount_mismatch"][0];
    assert_eq!(mismatch["row"]["reference_number"], "APE-INVESTMENT-1700000000-RCN002");
    assert_eq!(mismatch["match_type"], "amount_mismatch");
    // Signed provider-minus-intent: the provider claims 5000 more.
    assert_eq!(mismatch["discrepancy"], "5000");

    assert_eq!(report["not_found"].as_array().unwrap().len(), 1);
    assert_eq!(
        report["not_found"][0]["row"]["reference_number"],
        "SAMA-NAFFA-DEPOSIT-1700000000-GHOST"
    );

    let missing = report["missing_from_provider"].as_array().unwrap();
    assert!(missing.contains(&json!("SAMA-NAFFA-DEPOSIT-1700000000-RCN003")));

    assert_eq!(report["skipped_rows"], 1);
    assert_eq!(report["out_of_scope_rows"], 1);

    // Preview is read-only.
    assert_eq!(balance_of(&ledger, account.id).await, BigDecimal::from(0));
    let (_, intent) = get(&app, "/intents/SAMA-NAFFA-DEPOSIT-1700000000-RCN001").await;
    assert_eq!(intent["status"], "PENDING");
}

#[tokio::test]
async fn apply_settles_through_the_state_machine() {
    let TestApp { app, ledger } = test_app();
    let account = seed_account(&ledger, 0).await;
    seed_intent(
        &ledger,
        &account,
        IntentType::Deposit,
        10_000,
        "SAMA-NAFFA-DEPOSIT-1700000000-RCN001",
    )
    .await;

    let rows = json!({
        "rows": [{
            "reference_number": "SAMA-NAFFA-DEPOSIT-1700000000-RCN001",
            "provider_transaction_id": "GU-100",
            "amount": "10000",
            "status_code": "200"
        }]
    });

    let (status, results) = post_json(&app, "/reconciliation/apply", rows.clone()).await;
    assert_eq!(status, 200);
    assert_eq!(results[0]["applied"], true);
    assert_eq!(results[0]["status"], "COMPLETED");
    assert_eq!(balance_of(&ledger, account.id).await, BigDecimal::from(10_000));

    // Audit log tags the channel.
    let (_, logs) = get(&app, "/intents/SAMA-NAFFA-DEPOSIT-1700000000-RCN001/logs").await;
    assert_eq!(logs.as_array().unwrap()[0]["status"], "RECONCILE_COMPLETED");

    // Re-applying is idempotent: same balance, flagged duplicate.
    let (_, results) = post_json(&app, "/reconciliation/apply", rows).await;
    assert_eq!(results[0]["duplicate"], true);
    assert_eq!(results[0]["applied"], false);
    assert_eq!(balance_of(&ledger, account.id).await, BigDecimal::from(10_000));
}

#[tokio::test]
async fn apply_revalidates_amounts_per_row() {
    let TestApp { app, ledger } = test_app();
    let account = seed_account(&ledger, 0).await;
    seed_intent(
        &ledger,
        &account,
        IntentType::Deposit,
        45_000,
        "APE-INVESTMENT-1700000000-RCN002",
    )
    .await;
    seed_intent(
        &ledger,
        &account,
        IntentType::Deposit,
        10_000,
        "SAMA-NAFFA-DEPOSIT-1700000000-RCN001",
    )
    .await;

    let (status, results) = post_json(
        &app,
        "/reconciliation/apply",
        json!({
            "rows": [
                {
                    "reference_number": "APE-INVESTMENT-1700000000-RCN002",
                    "provider_transaction_id": "GU-101",
                    "amount": "50000",
                    "status_code": "200"
                },
                {
                    "reference_number": "SAMA-NAFFA-DEPOSIT-1700000000-RCN001",
                    "provider_transaction_id": "GU-100",
                    "amount": "10000",
                    "status_code": "200"
                }
            ]
        }),
    )
    .await;

    assert_eq!(status, 200);
    // Bad row reports its error, good row still applies.
    assert_eq!(results[0]["applied"], false);
    assert!(results[0]["error"].as_str().unwrap().contains("amount mismatch"));
    assert_eq!(results[1]["applied"], true);
    assert_eq!(balance_of(&ledger, account.id).await, BigDecimal::from(10_000));
}

#[tokio::test]
async fn withdrawal_applied_by_reconciliation_respects_balance_invariant() {
    let TestApp { app, ledger } = test_app();
    let account = seed_account(&ledger, 15_000).await;
    seed_intent(
        &ledger,
        &account,
        IntentType::Withdrawal,
        20_000,
        "SAMA-NAFFA-WITHDRAWAL-1700000000-RCN004",
    )
    .await;

    let (_, results) = post_json(
        &app,
        "/reconciliation/apply",
        json!({
            "rows": [{
                "reference_number": "SAMA-NAFFA-WITHDRAWAL-1700000000-RCN004",
                "provider_transaction_id": "GU-104",
                "amount": "20000",
                "status_code": "200"
            }]
        }),
    )
    .await;

    // Funds were spent elsewhere in the interim: the batch path must
    // downgrade exactly like a live callback, never drive balance negative.
    assert_eq!(results[0]["status"], "FAILED");
    assert_eq!(balance_of(&ledger, account.id).await, BigDecimal::from(15_000));
}
