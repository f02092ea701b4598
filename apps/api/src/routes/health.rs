use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns a simple status object with service version, backend mode and
/// whether external job search is configured.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "careerlens-api",
        "backend": state.session.backend_mode(),
        "job_search": state.config.rapidapi_key.is_some(),
    }))
}
