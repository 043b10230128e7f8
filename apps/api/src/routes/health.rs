use axum::Json;
use serde_json::{json, Value};

/// GET /health
/// Liveness only; `/api/v1/users/health` checks the backing services.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "aura-api"
    }))
}
