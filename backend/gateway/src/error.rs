//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use concierge_core::ConciergeError;

pub const RATE_LIMITED_TEXT: &str = "Too many requests. Please try again later.";

/// Error returned by every gateway handler.
#[derive(Debug)]
pub enum ApiError {
    Domain(ConciergeError),
    BadRequest(String),
    Unauthorized(String),
    Forbidden,
    RateLimited,
    Unavailable(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Domain(e) => match e {
                ConciergeError::Validation(_) | ConciergeError::NoSessionSelected => {
                    StatusCode::BAD_REQUEST
                }
                ConciergeError::NotPrivileged => StatusCode::FORBIDDEN,
                ConciergeError::SessionNotFound(_) => StatusCode::NOT_FOUND,
                ConciergeError::VersionConflict { .. } => StatusCode::CONFLICT,
                ConciergeError::StoreBusy(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::BadRequest(m) | ApiError::Unauthorized(m) | ApiError::Unavailable(m) => m.clone(),
            ApiError::Forbidden => "Forbidden".to_string(),
            ApiError::RateLimited => RATE_LIMITED_TEXT.to_string(),
            ApiError::Domain(e) => e.to_string(),
        }
    }
}

impl From<ConciergeError> for ApiError {
    fn from(e: ConciergeError) -> Self {
        ApiError::Domain(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Domain(ConciergeError::Other(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.message(), "Request failed");
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
