//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::response::ErrorResponse;
use crate::etl::EtlError;

/// Result type alias for handler operations
pub type ApiResult<T> = std::result::Result<T, AppError>;

/// Application error mapped onto HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Etl(#[from] EtlError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Etl(EtlError::AlreadyRunning) => {
                (StatusCode::CONFLICT, "ALREADY_RUNNING", self.to_string())
            },
            AppError::Etl(EtlError::NoSnapshot) => {
                (StatusCode::NOT_FOUND, "NO_SNAPSHOT", self.to_string())
            },
            AppError::Etl(err) => {
                tracing::error!("ETL error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "ETL_ERROR", err.to_string())
            },
            AppError::Internal(message) => {
                tracing::error!("Internal error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            },
        };

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_running_maps_to_conflict() {
        let response = AppError::from(EtlError::AlreadyRunning).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn no_snapshot_maps_to_not_found() {
        let response = AppError::from(EtlError::NoSnapshot).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
