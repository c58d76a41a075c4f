//! Manual fallback channel: settles when the webhook never arrived,
//! no-ops after it did, and refuses amounts that contradict the intent.

mod common;

use bigdecimal::BigDecimal;
use serde_json::json;

use common::*;
use naffa_core::domain::IntentType;

#[tokio::test]
async fn fallback_settles_when_webhook_never_arrived() {
    let TestApp { app, ledger } = test_app();
    let account = seed_account(&ledger, 50_000).await;
    seed_intent(
        &ledger,
        &account,
        IntentType::Deposit,
        10_000,
        "SAMA-NAFFA-DEPOSIT-1700000000-FBK001",
    )
    .await;

    let (status, body) = get(
        &app,
        "/payments/return?referenceNumber=SAMA-NAFFA-DEPOSIT-1700000000-FBK001&errorCode=200&num_transaction_from_gu=GU-31&amount=10000",
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "COMPLETED");
    assert_eq!(body["duplicate"], false);
    assert_eq!(balance_of(&ledger, account.id).await, BigDecimal::from(60_000));

    // Audit log carries the channel tag.
    let (_, logs) = get(&app, "/intents/SAMA-NAFFA-DEPOSIT-1700000000-FBK001/logs").await;
    assert_eq!(logs.as_array().unwrap()[0]["status"], "MANUAL_COMPLETED");
}

#[tokio::test]
async fn fallback_after_webhook_is_a_noop() {
    let TestApp { app, ledger } = test_app();
    let account = seed_account(&ledger, 50_000).await;
    seed_intent(
        &ledger,
        &account,
        IntentType::Deposit,
        10_000,
        "SAMA-NAFFA-DEPOSIT-1700000001-FBK002",
    )
    .await;

    let (status, _) = post_json(
        &app,
        "/callback",
        json!({
            "referenceNumber": "SAMA-NAFFA-DEPOSIT-1700000001-FBK002",
            "errorCode": "200",
            "num_transaction_from_gu": "GU-32"
        }),
    )
    .await;
    assert_eq!(status, 200);

    let (status, body) = get(
        &app,
        "/payments/return?referenceNumber=SAMA-NAFFA-DEPOSIT-1700000001-FBK002&errorCode=200&num_transaction_from_gu=GU-32&amount=10000",
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["duplicate"], true);
    // Same final balance as settling once.
    assert_eq!(balance_of(&ledger, account.id).await, BigDecimal::from(60_000));

    // The replayed delivery is audited like any other.
    let (_, logs) = get(&app, "/intents/SAMA-NAFFA-DEPOSIT-1700000001-FBK002/logs").await;
    let statuses: Vec<&str> = logs
        .as_array()
        .unwrap()
        .iter()
        .map(|log| log["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["COMPLETED", "MANUAL_DUPLICATE_IGNORED"]);
}

#[tokio::test]
async fn fallback_amount_mismatch_is_rejected_without_state_change() {
    let TestApp { app, ledger } = test_app();
    let account = seed_account(&ledger, 50_000).await;
    seed_intent(
        &ledger,
        &account,
        IntentType::Deposit,
        12_000,
        "SAMA-NAFFA-DEPOSIT-1700000002-FBK003",
    )
    .await;

    let (status, body) = get(
        &app,
        "/payments/return?referenceNumber=SAMA-NAFFA-DEPOSIT-1700000002-FBK003&errorCode=200&amount=10000",
    )
    .await;

    assert_eq!(status, 400);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("amount mismatch"));

    let (_, intent) = get(&app, "/intents/SAMA-NAFFA-DEPOSIT-1700000002-FBK003").await;
    assert_eq!(intent["status"], "PENDING");
    assert_eq!(balance_of(&ledger, account.id).await, BigDecimal::from(50_000));
}

#[tokio::test]
async fn fallback_amount_check_is_exact() {
    let TestApp { app, ledger } = test_app();
    let account = seed_account(&ledger, 0).await;
    seed_intent(
        &ledger,
        &account,
        IntentType::Deposit,
        10_000,
        "SAMA-NAFFA-DEPOSIT-1700000004-FBK005",
    )
    .await;

    // Off by less than a centime: still a mismatch, the stored amount is
    // compared exactly.
    let (status, _) = get(
        &app,
        "/payments/return?referenceNumber=SAMA-NAFFA-DEPOSIT-1700000004-FBK005&errorCode=200&num_transaction_from_gu=GU-33&amount=10000.005",
    )
    .await;

    assert_eq!(status, 400);
    let (_, intent) = get(&app, "/intents/SAMA-NAFFA-DEPOSIT-1700000004-FBK005").await;
    assert_eq!(intent["status"], "PENDING");
}

#[tokio::test]
async fn fallback_propagates_failure_codes_through_the_shared_table() {
    let TestApp { app, ledger } = test_app();
    let account = seed_account(&ledger, 0).await;
    seed_intent(
        &ledger,
        &account,
        IntentType::Deposit,
        5_000,
        "SAMA-NAFFA-DEPOSIT-1700000003-FBK004",
    )
    .await;

    let (status, body) = get(
        &app,
        "/payments/return?referenceNumber=SAMA-NAFFA-DEPOSIT-1700000003-FBK004&errorCode=420&amount=5000",
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "FAILED");
    assert_eq!(balance_of(&ledger, account.id).await, BigDecimal::from(0));
}

#[tokio::test]
async fn fallback_unknown_reference_is_404() {
    let TestApp { app, .. } = test_app();
    let (status, _) = get(
        &app,
        "/payments/return?referenceNumber=SAMA-NAFFA-DEPOSIT-1-GHOST&errorCode=200",
    )
    .await;
    assert_eq!(status, 404);
}
