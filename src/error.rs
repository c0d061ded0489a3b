use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{client::ClientError, models::Notice, session::SessionError};

/// Shown whenever a failure carries no message of its own.
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// AppError
///
/// Handler-level failure. Every variant renders as a `Notice` body so the
/// frontend can surface it as a notification without special-casing.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream { status, .. } => *status,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(detail) => {
                tracing::error!(%detail, "request failed");
                GENERIC_FAILURE.to_string()
            }
            other => other.to_string(),
        };

        (status, Json(Notice::failure(message))).into_response()
    }
}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Unauthorized(message) => AppError::Unauthorized(message),
            ClientError::Forbidden(message) => AppError::Forbidden(message),
            ClientError::Rejected { status, message } => AppError::Upstream { status, message },
            ClientError::Transport(e) => {
                tracing::warn!(error = %e, "upstream backend unreachable");
                AppError::Upstream {
                    status: StatusCode::BAD_GATEWAY,
                    message: GENERIC_FAILURE.to_string(),
                }
            }
            ClientError::Malformed(detail) => AppError::Internal(detail),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Signing(e) => AppError::Internal(e.to_string()),
            SessionError::InvalidHeader(e) => AppError::Internal(e.to_string()),
            other => AppError::Unauthorized(other.to_string()),
        }
    }
}
