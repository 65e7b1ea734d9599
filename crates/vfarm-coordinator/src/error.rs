//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use vfarm_orchestrator::OrchestratorError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Orchestrator(err) => match err {
                OrchestratorError::NodeNotFound(_)
                | OrchestratorError::JobNotFound(_)
                | OrchestratorError::EmptyQueue => StatusCode::NOT_FOUND,
                OrchestratorError::InvalidInput(_) | OrchestratorError::StaleMetrics(_) => {
                    StatusCode::BAD_REQUEST
                }
                OrchestratorError::AlreadyTracked(_) => StatusCode::CONFLICT,
                OrchestratorError::NoAvailableNodes(_) | OrchestratorError::NoIdleNode => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
            },
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse {
            detail: self.to_string(),
        });
        (status, body).into_response()
    }
}
