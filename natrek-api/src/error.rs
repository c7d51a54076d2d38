use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use natrek_core::CoreError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized,
    NotFound(String),
    Conflict(String),
    TooManyRequests,
    InternalServerError(String),
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidDate(_) | CoreError::Validation(_) => {
                AppError::BadRequest(err.to_string())
            }
            CoreError::NotFound { .. } => AppError::NotFound(err.to_string()),
            CoreError::CapacityExceeded { .. } | CoreError::StaleTransition(_) => {
                AppError::Conflict(err.to_string())
            }
            // retries already exhausted by the service layer
            CoreError::Conflict => {
                AppError::Conflict("transient storage conflict, please retry".to_string())
            }
            CoreError::Unauthorized => AppError::Unauthorized,
            CoreError::RateLimited => AppError::TooManyRequests,
            CoreError::Storage(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::TooManyRequests => {
                (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded".to_string())
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
