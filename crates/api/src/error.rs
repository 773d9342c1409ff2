use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use backend::models::ApiErrorBody;
use backend::BackendError;
use thiserror::Error;
use validator::ValidationErrors;

/// Code sent with 422 responses.
pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("{0}")]
    Validation(#[from] ValidationErrors),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Backend(BackendError::Api { status, code, message }) => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                ApiErrorBody { code, message },
            ),
            ApiError::Backend(other) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorBody { code: None, message: other.to_string() },
            ),
            ApiError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiErrorBody {
                    code: Some(VALIDATION_FAILED.to_owned()),
                    message: errors.to_string(),
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}
