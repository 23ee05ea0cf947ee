//! Error types for web handlers.
//!
//! [`AppError`] bridges [`MarketplaceError`] and HTTP: every domain code maps
//! to one status, and the body is always `{ "code", "message" }`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use marketplace_core::error::{MarketplaceError, ValidationError};
use serde::Serialize;
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler() -> Result<Json<Booking>, AppError> {
///     let booking = service.get(id).await?; // MarketplaceError converts
///     Ok(Json(booking))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Create a new error with a source error.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// HTTP status
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Stable error code
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into(), "BAD_REQUEST".to_string())
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message.into(), "UNAUTHORIZED".to_string())
    }

    /// Create a 403 Forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message.into(), "FORBIDDEN".to_string())
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} '{id}' not found"),
            "NOT_FOUND".to_string(),
        )
    }

    /// Create a 422 Unprocessable Entity error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            message.into(),
            "VALIDATION_ERROR".to_string(),
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_ERROR".to_string(),
        )
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            "SERVICE_UNAVAILABLE".to_string(),
        )
    }
}

/// HTTP status for a domain error code
#[must_use]
pub fn status_for(code: &str) -> StatusCode {
    match code {
        "VALIDATION_ERROR" | "INVALID_DETAILS" | "UNSUPPORTED_TYPE" => StatusCode::UNPROCESSABLE_ENTITY,
        "UNAUTHORIZED" | "INVALID_SIGNATURE" => StatusCode::UNAUTHORIZED,
        "FORBIDDEN" => StatusCode::FORBIDDEN,
        "NOT_FOUND" => StatusCode::NOT_FOUND,
        "ALREADY_EXISTS" | "ALREADY_PROCESSED" | "INVALID_STATUS" => StatusCode::CONFLICT,
        "GATEWAY_ERROR" => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<MarketplaceError> for AppError {
    fn from(error: MarketplaceError) -> Self {
        let code = error.code();
        let status = status_for(code);
        match error {
            // Store details stay in the logs.
            MarketplaceError::Store(_) => {
                let message = error.to_string();
                Self::internal("An internal error occurred").with_source(anyhow::Error::msg(message))
            },
            MarketplaceError::ConfigMissing => {
                Self::new(status, error.to_string(), code.to_string())
                    .with_source(anyhow::Error::msg("no active configuration row"))
            },
            other => Self::new(status, other.to_string(), code.to_string()),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(error: ValidationError) -> Self {
        MarketplaceError::Validation(error).into()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: String,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Internal server error"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Internal server error"
                );
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

/// Convert `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketplace_core::error::{GatewayError, StoreError, TransitionError};
    use marketplace_core::types::{ApprovalStatus, BookingStatus};

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn test_not_found() {
        let err: AppError = MarketplaceError::not_found("booking", "123").into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "NOT_FOUND");
    }

    #[test]
    fn test_transition_errors_are_conflicts() {
        let already: AppError =
            MarketplaceError::Transition(TransitionError::AlreadyDecided(ApprovalStatus::Rejected)).into();
        assert_eq!(already.status, StatusCode::CONFLICT);
        assert_eq!(already.code, "ALREADY_PROCESSED");

        let invalid: AppError = MarketplaceError::Transition(TransitionError::InvalidStatus {
            action: "approve",
            status: BookingStatus::Confirmed,
        })
        .into();
        assert_eq!(invalid.status, StatusCode::CONFLICT);
        assert_eq!(invalid.code, "INVALID_STATUS");
    }

    #[test]
    fn test_details_errors_are_unprocessable() {
        let err: AppError = ValidationError::UnsupportedType("cruises".into()).into();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code, "UNSUPPORTED_TYPE");
    }

    #[test]
    fn test_signature_and_gateway_errors() {
        let sig: AppError = MarketplaceError::InvalidSignature.into();
        assert_eq!(sig.status, StatusCode::UNAUTHORIZED);

        let gateway: AppError = MarketplaceError::Gateway(GatewayError::Timeout).into();
        assert_eq!(gateway.status, StatusCode::BAD_GATEWAY);
        assert_eq!(gateway.code, "GATEWAY_ERROR");
    }

    #[test]
    fn test_store_errors_hide_details() {
        let err: AppError = MarketplaceError::Store(StoreError::Database("password=hunter2".into())).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("hunter2"));
    }

    #[test]
    fn test_config_missing_is_server_error() {
        let err: AppError = MarketplaceError::ConfigMissing.into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "CONFIG_MISSING");
    }
}
