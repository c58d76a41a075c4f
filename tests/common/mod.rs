//! Shared test fixtures: an app wired to the in-memory ledger, plus request
//! helpers around `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use bigdecimal::BigDecimal;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use naffa_core::adapters::MemoryLedger;
use naffa_core::domain::intent::NewIntent;
use naffa_core::domain::{AccountType, IntentType, TransactionIntent, UserAccount};
use naffa_core::ports::LedgerStore;
use naffa_core::services::notifier::NoopNotifier;
use naffa_core::{create_app, AppState};

pub struct TestApp {
    pub app: Router,
    pub ledger: Arc<MemoryLedger>,
}

pub fn test_app() -> TestApp {
    let ledger = Arc::new(MemoryLedger::new());
    let state = AppState::new(ledger.clone(), Arc::new(NoopNotifier));
    TestApp {
        app: create_app(state),
        ledger,
    }
}

pub async fn seed_account(ledger: &MemoryLedger, balance: i64) -> UserAccount {
    let mut account = UserAccount::new(Uuid::new_v4(), AccountType::SamaNaffa);
    account.balance = BigDecimal::from(balance);
    ledger.create_account(account).await.unwrap()
}

pub async fn seed_intent(
    ledger: &MemoryLedger,
    account: &UserAccount,
    intent_type: IntentType,
    amount: i64,
    reference: &str,
) -> TransactionIntent {
    let intent = TransactionIntent::open(NewIntent {
        reference_number: reference.to_string(),
        user_id: account.user_id,
        account_id: account.id,
        account_type: account.account_type,
        intent_type,
        amount: BigDecimal::from(amount),
        payment_method: "intouch".to_string(),
        investment_tranche: None,
        investment_term: None,
    });
    ledger.create_intent(intent).await.unwrap()
}

pub async fn balance_of(ledger: &MemoryLedger, account_id: Uuid) -> BigDecimal {
    ledger.account(account_id).await.unwrap().balance
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_form(app: &Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_text(app: &Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "text/csv")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}
