//! Error types shared across the marketplace.
//!
//! Every error exposes a stable machine-readable `code()` which the HTTP
//! layer forwards to clients unchanged.

use crate::types::{ApprovalStatus, BookingStatus};
use thiserror::Error;

/// Input rejected before any state was touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Booking details do not match the schema of their vertical
    #[error("invalid booking details: {0}")]
    InvalidDetails(String),

    /// The booking type is not one of the supported verticals
    #[error("unsupported booking type '{0}'")]
    UnsupportedType(String),

    /// A single request field is malformed
    #[error("{field}: {reason}")]
    Field {
        /// Field name as the client sent it
        field: &'static str,
        /// Human-readable reason
        reason: String,
    },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Field`]
    #[must_use]
    pub fn field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Field {
            field,
            reason: reason.into(),
        }
    }

    /// Stable error code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidDetails(_) => "INVALID_DETAILS",
            Self::UnsupportedType(_) => "UNSUPPORTED_TYPE",
            Self::Field { .. } => "VALIDATION_ERROR",
        }
    }
}

/// A booking action that is not legal in the booking's current state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The booking status does not allow the action
    #[error("cannot {action} a booking in status '{status}'")]
    InvalidStatus {
        /// Attempted action
        action: &'static str,
        /// Status the booking was in
        status: BookingStatus,
    },

    /// The vendor decision was already taken
    #[error("booking request already {0}")]
    AlreadyDecided(ApprovalStatus),

    /// The booking already has a successful payment
    #[error("booking is already paid")]
    AlreadyPaid,

    /// The actor does not own the booking
    #[error("{0}")]
    NotOwner(&'static str),

    /// Override without a reason
    #[error("a reason is required to override a booking status")]
    MissingReason,
}

impl TransitionError {
    /// Stable error code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidStatus { .. } => "INVALID_STATUS",
            Self::AlreadyDecided(_) | Self::AlreadyPaid => "ALREADY_PROCESSED",
            Self::NotOwner(_) => "FORBIDDEN",
            Self::MissingReason => "VALIDATION_ERROR",
        }
    }
}

/// Persistence failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Database or connection failure
    #[error("database error: {0}")]
    Database(String),

    /// A unique key already exists
    #[error("duplicate key: {0}")]
    Duplicate(String),

    /// Stored data could not be decoded
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Payment gateway failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The request did not complete in time
    #[error("gateway request timed out")]
    Timeout,

    /// Network-level failure
    #[error("gateway unreachable: {0}")]
    Transport(String),

    /// The gateway answered with an error
    #[error("gateway rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Gateway message
        message: String,
    },

    /// The gateway answered with something we could not parse
    #[error("unexpected gateway response: {0}")]
    InvalidResponse(String),
}

/// Commission resolution failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommissionError {
    /// No active configuration exists
    #[error("no active commission configuration")]
    ConfigMissing,

    /// The configuration could not be loaded
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Umbrella error returned by application services.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketplaceError {
    /// Input validation failure
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Illegal state transition
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// No or unusable credentials
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Entity not found
    #[error("{resource} '{id}' not found")]
    NotFound {
        /// Kind of entity
        resource: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Entity already exists
    #[error("{0}")]
    AlreadyExists(String),

    /// Work was already done
    #[error("{0}")]
    AlreadyProcessed(String),

    /// Webhook signature mismatch
    #[error("invalid webhook signature")]
    InvalidSignature,

    /// Gateway failure
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Missing platform configuration
    #[error("no active commission configuration")]
    ConfigMissing,

    /// Persistence failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl MarketplaceError {
    /// Shorthand for [`MarketplaceError::NotFound`]
    #[must_use]
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Stable error code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.code(),
            Self::Transition(e) => e.code(),
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::AlreadyProcessed(_) => "ALREADY_PROCESSED",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::Gateway(_) => "GATEWAY_ERROR",
            Self::ConfigMissing => "CONFIG_MISSING",
            Self::Store(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<CommissionError> for MarketplaceError {
    fn from(error: CommissionError) -> Self {
        match error {
            CommissionError::ConfigMissing => Self::ConfigMissing,
            CommissionError::Store(e) => Self::Store(e),
        }
    }
}

/// Result alias for application services
pub type Result<T> = std::result::Result<T, MarketplaceError>;
