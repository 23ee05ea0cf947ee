//! Outbound notifications to explorers and vendors.
//!
//! Delivery is best effort: callers log failures and never roll back the
//! state change that triggered the notification.

use crate::BoxFuture;
use crate::types::{BookingId, BookingStatus, Money, UserId};
use serde::Serialize;
use thiserror::Error;

/// Something a user should hear about
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// Vendor approved an accommodation request
    BookingApproved {
        /// Booking
        booking_id: BookingId,
        /// Human-facing booking code
        code: String,
        /// Recipient
        explorer: UserId,
        /// Vendor's note
        message: Option<String>,
    },
    /// Vendor rejected an accommodation request
    BookingRejected {
        /// Booking
        booking_id: BookingId,
        /// Human-facing booking code
        code: String,
        /// Recipient
        explorer: UserId,
        /// Vendor's note
        message: Option<String>,
    },
    /// Payment verified and booking confirmed
    PaymentConfirmed {
        /// Booking
        booking_id: BookingId,
        /// Human-facing booking code
        code: String,
        /// Payer
        explorer: UserId,
        /// Listing owner
        vendor: UserId,
        /// Gateway reference
        reference: String,
        /// Amount charged
        amount: Money,
    },
    /// Vendor or admin forced a status change
    StatusOverridden {
        /// Booking
        booking_id: BookingId,
        /// Human-facing booking code
        code: String,
        /// Recipient
        explorer: UserId,
        /// New status
        status: BookingStatus,
        /// Reason given
        reason: String,
    },
}

impl Notification {
    /// Short name used in logs and metrics
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::BookingApproved { .. } => "booking_approved",
            Self::BookingRejected { .. } => "booking_rejected",
            Self::PaymentConfirmed { .. } => "payment_confirmed",
            Self::StatusOverridden { .. } => "status_overridden",
        }
    }

    /// Booking the notification is about
    #[must_use]
    pub const fn booking_id(&self) -> BookingId {
        match self {
            Self::BookingApproved { booking_id, .. }
            | Self::BookingRejected { booking_id, .. }
            | Self::PaymentConfirmed { booking_id, .. }
            | Self::StatusOverridden { booking_id, .. } => *booking_id,
        }
    }
}

/// Delivery failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Notification channel (email, push, in-app)
pub trait Notifier: Send + Sync {
    /// Delivers one notification
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] when the channel rejects or drops the message.
    fn notify(&self, notification: Notification) -> BoxFuture<'_, Result<(), NotifyError>>;
}
