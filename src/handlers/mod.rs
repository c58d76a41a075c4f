pub mod fallback;
pub mod intents;
pub mod reconciliation;
pub mod webhook;

use axum::Json;
use serde_json::json;

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}
