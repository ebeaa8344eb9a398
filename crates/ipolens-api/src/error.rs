use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ipolens_core::IpoLensError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("IPO Lens error: {0}")]
    Core(#[from] IpoLensError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::Core(ref err) => match err {
                IpoLensError::UsageLimit => (StatusCode::FORBIDDEN, self.to_string()),
                IpoLensError::Auth(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
                IpoLensError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
                IpoLensError::InvalidOperation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
                IpoLensError::Llm(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            },
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
