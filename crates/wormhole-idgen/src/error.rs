use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;
use wormhole_generator::GeneratorError;

use crate::model::ErrorResponse;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    #[error("id generation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Generator(GeneratorError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Generator(GeneratorError::Failed(_)) | AppError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        error!(error = %self, status = status.as_u16(), "failed to generate id");

        let body = ErrorResponse {
            error: "Failed to generate ID".to_string(),
        };
        (status, Json(body)).into_response()
    }
}
