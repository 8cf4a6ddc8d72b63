use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use warden_core::DomainError;

use super::response::Envelope;

/// Every failure a request can end in. Messages are fixed; details only go
/// to the log at the call site.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    Conflict,

    #[error("enforcement error")]
    Enforcement,

    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::Enforcement | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        json_error(self.status(), &self.to_string())
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(_) => ApiError::BadRequest("invalid request parameters"),
            DomainError::InvalidId(_) => ApiError::BadRequest("invalid id"),
            DomainError::NotFound => ApiError::NotFound,
            DomainError::Conflict(_) => ApiError::Conflict,
        }
    }
}

/// Envelope error response with the status mirrored in `code`.
pub fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(Envelope::error(status.as_u16(), message))).into_response()
}
