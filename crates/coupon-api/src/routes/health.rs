//! Liveness probe

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::ApiState;

/// Body of `GET /health`
#[derive(Serialize)]
#[allow(missing_docs)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub quota: u64,
    pub granted: u64,
    pub timestamp: String,
}

/// Reports the process as up together with how much of the quota it has handed out
pub async fn health_check(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        quota: state.engine.config().quota,
        granted: state.engine.stats().granted,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
