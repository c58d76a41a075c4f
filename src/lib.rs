pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod normalizer;
pub mod ports;
pub mod reference;
pub mod services;
pub mod settlement;
pub mod status;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::ports::{LedgerStore, Notifier};
use crate::settlement::SettlementEngine;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn LedgerStore>,
    pub engine: Arc<SettlementEngine>,
}

impl AppState {
    pub fn new(ledger: Arc<dyn LedgerStore>, notifier: Arc<dyn Notifier>) -> Self {
        let engine = Arc::new(SettlementEngine::new(ledger.clone(), notifier));
        Self { ledger, engine }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/intents", post(handlers::intents::create_intent))
        .route("/intents/:reference", get(handlers::intents::get_intent))
        .route(
            "/intents/:reference/logs",
            get(handlers::intents::get_intent_logs),
        )
        .route(
            "/intents/:reference/reverse",
            post(handlers::intents::reverse_intent),
        )
        .route(
            "/intents/:reference/cancel",
            post(handlers::intents::cancel_intent),
        )
        .route("/accounts/:id", get(handlers::intents::get_account))
        .route(
            "/callback",
            get(handlers::webhook::callback).post(handlers::webhook::callback),
        )
        .route("/payments/return", get(handlers::fallback::payment_return))
        .route(
            "/reconciliation/preview",
            post(handlers::reconciliation::preview),
        )
        .route(
            "/reconciliation/apply",
            post(handlers::reconciliation::apply),
        )
        .with_state(state)
}
