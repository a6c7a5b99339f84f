use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::domain::{DomainError, Embedding};

#[derive(Debug, Deserialize)]
pub struct EmbedRequest {
    pub texts: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub async fn embed_handler(
    State(state): State<AppState>,
    Json(request): Json<EmbedRequest>,
) -> Result<Json<Vec<Embedding>>, (StatusCode, Json<ErrorResponse>)> {
    state
        .embed_service
        .embed(&request.texts)
        .await
        .map(Json)
        .map_err(error_response)
}

fn error_response(err: DomainError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, message) = match &err {
        DomainError::BatchTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, err.to_string()),
        DomainError::Inference(_) | DomainError::Internal(_) => {
            tracing::error!(error = %err, "Embedding failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_string(),
            )
        }
    };
    if status.is_client_error() {
        tracing::warn!(error = %err, "Embedding request rejected");
    }
    (status, Json(ErrorResponse { error: message }))
}
