use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Why the access gate refused a request.
///
/// 401 kinds mean "who are you"; 403 kinds mean "known, but not permitted".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("Missing access token")]
    MissingToken,

    #[error("Invalid access token")]
    InvalidToken,

    #[error("Access disabled")]
    AccessDisabled,

    #[error("Access expired")]
    AccessExpired,

    #[error("Insufficient scope")]
    InsufficientScope,
}

impl AuthFailure {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthFailure::MissingToken | AuthFailure::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthFailure::AccessDisabled
            | AuthFailure::AccessExpired
            | AuthFailure::InsufficientScope => StatusCode::FORBIDDEN,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AuthFailure::MissingToken => "Missing access token",
            AuthFailure::InvalidToken => "Invalid access token",
            AuthFailure::AccessDisabled => "Access disabled",
            AuthFailure::AccessExpired => "Access expired",
            AuthFailure::InsufficientScope => "Insufficient scope",
        }
    }
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        error_response(self.status(), self.message())
    }
}

/// Errors returned by the public-access endpoints.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthFailure),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Store(#[from] anyhow::Error),
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        AppError::BadRequest(msg.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Auth(failure) => failure.into_response(),
            AppError::BadRequest(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
            AppError::Store(e) => {
                tracing::error!("store error: {:#}", e);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
            }
        }
    }
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    (status, Json(json!({ "error": msg }))).into_response()
}
