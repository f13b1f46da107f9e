pub mod transactions;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub store: String,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let store_status = match state.service.store().ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the ledger store");
            "disconnected"
        }
    };

    let healthy = store_status == "connected";
    let body = HealthStatus {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: store_status.to_string(),
    };

    // Return 503 if the store is down, 200 otherwise
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(body))
}
