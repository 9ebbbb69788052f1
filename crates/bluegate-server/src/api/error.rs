//! API error types and response handling.
//!
//! Every handler returns [`ApiResult`]; failures render as
//! `{ "error", "message", "details" }` with a status code chosen per variant.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bluegate_core::BluegateError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// 500 Internal Server Error - The operation failed server-side or upstream.
    InternalError {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Upstream error text, when there is one.
        details: Option<String>,
    },

    /// 503 Service Unavailable - The adapter or the bus is unreachable.
    ServiceUnavailable {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Upstream error text, when there is one.
        details: Option<String>,
    },
}

/// Standard JSON error response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "bluetooth_device_fault",
    "message": "Device AA:BB:CC:DD:EE:FF: org.bluez.Error.AlreadyExists",
    "details": "org.bluez.Error.AlreadyExists"
}))]
pub struct ErrorResponse {
    /// Machine-readable error code.
    #[schema(example = "bluetooth_device_fault")]
    pub error: String,

    /// Human-readable error message.
    pub message: String,

    /// Upstream error text.
    #[schema(nullable)]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// HTTP status this error renders with.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            Self::InternalError {
                error_code,
                message,
                details,
            } => {
                tracing::error!(
                    error_code = %error_code,
                    message = %message,
                    details = ?details,
                    "Internal server error"
                );
                ErrorResponse {
                    error: error_code,
                    message,
                    details: details.map(serde_json::Value::String),
                }
            }

            Self::ServiceUnavailable {
                error_code,
                message,
                details,
            } => ErrorResponse {
                error: error_code,
                message,
                details: details.map(serde_json::Value::String),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InternalError { message, .. } => write!(f, "Internal Error: {message}"),
            Self::ServiceUnavailable { message, .. } => {
                write!(f, "Service Unavailable: {message}")
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl From<BluegateError> for ApiError {
    fn from(err: BluegateError) -> Self {
        let error_code = err.error_code().to_lowercase();
        let details = err.upstream_cause().map(str::to_string);
        let message = err.to_string();

        if err.http_status_code() == 503 {
            Self::ServiceUnavailable {
                error_code,
                message,
                details,
            }
        } else {
            Self::InternalError {
                error_code,
                message,
                details,
            }
        }
    }
}
