//! API error handling for HTTP handlers
//!
//! Every failure is rendered as `{"status": "error", "reason": ..., "message": ...}`
//! where `reason` is a stable machine-readable code.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rollcall_storage::{Rejection, StorageError};
use serde::Serialize;
use tracing::error;

/// Generic reason codes
pub mod reason {
    pub const INVALID_REQUEST: &str = "invalid_request";
    pub const INVALID_TEMPLATE: &str = "invalid_template";
    pub const NOT_FOUND: &str = "not_found";
    pub const CONFLICT: &str = "conflict";
    pub const INTERNAL: &str = "internal_error";
}

const INTERNAL_MESSAGE: &str = "Internal server error";

/// API error type for handler responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 400
    BadRequest { reason: &'static str, message: String },
    /// 404
    NotFound { reason: &'static str, message: String },
    /// 409
    Conflict(String),
    /// 500; the detail is logged, never returned
    Internal(String),
}

/// JSON body of an error response
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    status: &'static str,
    reason: &'a str,
    message: &'a str,
}

impl ApiError {
    /// Malformed or invalid request
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            reason: reason::INVALID_REQUEST,
            message: message.into(),
        }
    }

    /// Missing entity
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            reason: reason::NOT_FOUND,
            message: message.into(),
        }
    }

    /// Create internal server error from any error type
    pub fn internal(e: impl std::fmt::Display) -> Self {
        Self::Internal(e.to_string())
    }

    /// HTTP status of this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable reason code
    pub fn reason(&self) -> &'static str {
        match self {
            Self::BadRequest { reason, .. } | Self::NotFound { reason, .. } => reason,
            Self::Conflict(_) => reason::CONFLICT,
            Self::Internal(_) => reason::INTERNAL,
        }
    }

    /// Message shown to the client
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. } | Self::NotFound { message, .. } => message,
            Self::Conflict(message) => message,
            Self::Internal(_) => INTERNAL_MESSAGE,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message(), self.reason())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            error!(error = %detail, "request failed");
        }

        let body = ErrorBody {
            status: "error",
            reason: self.reason(),
            message: self.message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => Self::not_found(err.to_string()),
            StorageError::Conflict(message) => Self::Conflict(message),
            StorageError::Validation(message) => Self::bad_request(message),
            StorageError::Core(core) => core.into(),
            other => Self::internal(other),
        }
    }
}

impl From<rollcall_core::Error> for ApiError {
    fn from(err: rollcall_core::Error) -> Self {
        match err {
            rollcall_core::Error::InvalidTemplate(_) => Self::BadRequest {
                reason: reason::INVALID_TEMPLATE,
                message: err.to_string(),
            },
            rollcall_core::Error::Config(_) | rollcall_core::Error::UnknownTimezone(_) => Self::internal(err),
            other => Self::bad_request(other.to_string()),
        }
    }
}

impl From<Rejection> for ApiError {
    fn from(rejection: Rejection) -> Self {
        let message = rejection.message().to_string();
        if rejection.is_unidentified() {
            Self::NotFound {
                reason: rejection.reason(),
                message,
            }
        } else {
            Self::BadRequest {
                reason: rejection.reason(),
                message,
            }
        }
    }
}

/// Extension trait for converting results to ApiError
pub trait ResultExt<T> {
    /// Convert error to internal server error
    fn map_internal(self) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn map_internal(self) -> Result<T, ApiError> {
        self.map_err(ApiError::internal)
    }
}

/// Extension trait for converting options to ApiError
pub trait OptionExt<T> {
    /// Convert none to not found error
    fn or_not_found(self, msg: &str) -> Result<T, ApiError>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, msg: &str) -> Result<T, ApiError> {
        self.ok_or_else(|| ApiError::not_found(msg))
    }
}
