//! Sentiment analysis endpoint
//!
//! Every outcome is answered with HTTP 200; failures are reported in the
//! body.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use finsent_training::Prediction;

use crate::state::{ModelSlot, SharedState};

pub const UNAVAILABLE_MESSAGE: &str =
    "Model is not available. Please train the model first using 'finsent-train'";
pub const FAILED_MESSAGE: &str = "Prediction failed";

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AnalyzeResponse {
    Prediction(Prediction),
    Unavailable {
        error: String,
        model_status: String,
    },
    Failed {
        error: String,
    },
}

/// POST /analyze - Classify one text
pub async fn analyze_sentiment(
    State(state): State<SharedState>,
    Json(request): Json<AnalyzeRequest>,
) -> Json<AnalyzeResponse> {
    let analyzer = match &state.model {
        ModelSlot::Loaded(analyzer) => analyzer.clone(),
        ModelSlot::NotLoaded { .. } => {
            return Json(AnalyzeResponse::Unavailable {
                error: UNAVAILABLE_MESSAGE.to_string(),
                model_status: state.model.status().to_string(),
            })
        }
    };

    let preview: String = request.text.chars().take(50).collect();
    info!("Analyzing text: {}...", preview);

    let text = request.text;
    let result = tokio::task::spawn_blocking(move || analyzer.analyze(&text)).await;

    match result {
        Ok(Ok(prediction)) => {
            info!(
                "Analysis result: {} ({:.4})",
                prediction.label, prediction.score
            );
            Json(AnalyzeResponse::Prediction(prediction))
        }
        Ok(Err(e)) => {
            error!("Error during prediction: {}", e);
            Json(AnalyzeResponse::Failed {
                error: FAILED_MESSAGE.to_string(),
            })
        }
        Err(e) => {
            error!("Prediction task failed: {}", e);
            Json(AnalyzeResponse::Failed {
                error: FAILED_MESSAGE.to_string(),
            })
        }
    }
}
