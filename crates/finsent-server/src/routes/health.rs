//! Health check endpoint

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::SharedState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_status: String,
    pub device: String,
}

/// GET /health - Reports whether the model loaded at startup
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        model_status: state.model.status().to_string(),
        device: state.device.clone(),
    })
}
