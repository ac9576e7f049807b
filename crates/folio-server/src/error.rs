use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use folio_shared::SharedError;
use folio_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Too many requests")]
    RateLimited,

    #[error("Upstream error: {0}")]
    BadGateway(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::PayloadTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, self.to_string())
            }
            ServerError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            ServerError::BadGateway(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            ServerError::Storage(detail) => {
                tracing::error!(error = %detail, "Storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".to_string())
            }
            ServerError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ServerError::NotFound("Record not found".into()),
            StoreError::SessionExpired => ServerError::Unauthorized("Session expired".into()),
            other => ServerError::Storage(other.to_string()),
        }
    }
}

impl From<SharedError> for ServerError {
    fn from(err: SharedError) -> Self {
        match err {
            SharedError::InvalidSessionToken => ServerError::Unauthorized(err.to_string()),
            SharedError::InvalidDate(_)
            | SharedError::InvalidSlug(_)
            | SharedError::InvalidUsername(_) => ServerError::BadRequest(err.to_string()),
        }
    }
}
