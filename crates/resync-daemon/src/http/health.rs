use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET /live: the process is up.
pub async fn live_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /health: 503 when the most recent run of any sync failed.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let history = match state.store().list() {
        Ok(history) => history,
        Err(e) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "error", "error": e.to_string() })),
            )
        }
    };

    let failing = history
        .iter()
        .find(|(_, stats)| stats.first().is_some_and(|latest| !latest.success));
    if let Some((name, stats)) = failing {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "failing",
                "error": format!("one or more syncs failed including {name}"),
                "sync": name,
                "start": stats[0].start,
            })),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "syncs": history.len(),
        })),
    )
}
