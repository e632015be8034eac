//! Unified API error handling
//!
//! Provides consistent error responses across all endpoints, plus the
//! auth-error classifier used by the stores to decide on a re-login prompt.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Notice text shown when a session has to be re-established.
pub const SESSION_EXPIRED_MESSAGE: &str =
    "認証エラー: セッションが期限切れです。再ログインしてください";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ApiError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(anyhow::anyhow!(msg.into()))
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// True for session/credential failures, either by variant or because the
    /// upstream message mentions auth.
    pub fn is_auth_error(&self) -> bool {
        match self {
            Self::Unauthorized(_) | Self::SessionExpired(_) => true,
            Self::Upstream { status, message } => {
                *status == 401 || message_has_auth_marker(message)
            }
            Self::Internal(e) => message_has_auth_marker(&e.to_string()),
            Self::Forbidden(msg) | Self::BadRequest(msg) | Self::Conflict(msg) => {
                message_has_auth_marker(msg)
            }
            Self::NotFound(_) => false,
        }
    }

    /// Message suitable for a user-facing notice.
    pub fn notice_message(&self) -> String {
        if self.is_auth_error() {
            SESSION_EXPIRED_MESSAGE.to_string()
        } else {
            self.public_message()
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) | Self::SessionExpired(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::SessionExpired(_) => "SESSION_EXPIRED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Conflict(_) => "CONFLICT",
            Self::Upstream { .. } => "UPSTREAM_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Unauthorized(msg)
            | Self::SessionExpired(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg) => msg.clone(),
            Self::Upstream { message, .. } => message.clone(),
            // Don't leak internal error details
            Self::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

fn message_has_auth_marker(message: &str) -> bool {
    message.to_lowercase().contains("auth") || message.contains("認証") || message.contains("JWT")
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Log internal errors
        match &self {
            Self::Internal(e) => {
                tracing::error!(error = ?e, "Internal server error");
            }
            Self::Upstream { status, message } => {
                tracing::error!(status = *status, message = %message, "Upstream error");
            }
            _ => {
                tracing::warn!(error = %self, "API error");
            }
        }

        let status = self.status_code();
        let body = ErrorResponse {
            code: self.error_code().to_string(),
            message: self.public_message(),
            request_id: None, // Will be populated by middleware if available
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
