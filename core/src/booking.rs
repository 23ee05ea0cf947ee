//! Booking aggregate and its state machine.
//!
//! ```text
//! requested --approve--> pending --payment confirmed--> confirmed
//!     |                     |
//!     +------reject---------+--> cancelled
//! ```
//!
//! `failed` and any other off-path status is reachable only through an
//! administrative override. Confirmed, cancelled and failed are terminal for
//! the normal flow.

use crate::effect::Effect;
use crate::environment::Clock;
use crate::details::BookingDetails;
use crate::error::TransitionError;
use crate::notify::{Notification, Notifier};
use crate::reducer::Reducer;
use crate::types::{
    ApprovalStatus, BookingId, BookingPaymentStatus, BookingStatus, Category, Money, PaymentId,
    Role, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// Entity
// ============================================================================

/// Coupon applied at checkout
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    /// Coupon code, if any
    pub code: Option<String>,
    /// Discount already reflected in the total
    pub discount: Money,
    /// Whether the coupon was applied
    pub applied: bool,
}

/// Vendor sign-off on an accommodation request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorApproval {
    /// Decision
    pub status: ApprovalStatus,
    /// Note left by the vendor
    pub message: Option<String>,
    /// When the request was approved
    pub approved_at: Option<DateTime<Utc>>,
    /// When the request was rejected
    pub rejected_at: Option<DateTime<Utc>>,
}

impl VendorApproval {
    /// Undecided approval
    #[must_use]
    pub const fn pending() -> Self {
        Self {
            status: ApprovalStatus::Pending,
            message: None,
            approved_at: None,
            rejected_at: None,
        }
    }
}

/// One purchase intent against a listing
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    /// Identifier
    pub id: BookingId,
    /// Human-facing unique code, e.g. `EVT-7K2M9QXA`
    pub code: String,
    /// Owner of the booking
    pub explorer: UserId,
    /// Owner of the listing
    pub vendor: UserId,
    /// Vertical
    #[serde(rename = "type")]
    pub category: Category,
    /// Listing reference
    pub listing_id: String,
    /// Validated details for the vertical
    pub details: BookingDetails,
    /// Amount the explorer pays, service fee included
    pub total_amount: Money,
    /// Platform service fee
    pub service_fee: Money,
    /// Coupon
    pub coupon: Coupon,
    /// Lifecycle status
    pub status: BookingStatus,
    /// Latest payment attempt
    pub payment: Option<PaymentId>,
    /// Payment view of the booking
    pub payment_status: BookingPaymentStatus,
    /// Reference of the payment that succeeded
    pub payment_reference: Option<String>,
    /// Vendor decision, accommodations only
    pub vendor_approval: Option<VendorApproval>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
    /// Write counter used as the optimistic concurrency guard
    #[serde(skip)]
    pub version: i64,
}

/// Inputs for a new booking, already validated by the caller
#[derive(Clone, Debug)]
pub struct NewBooking {
    /// Explorer making the booking
    pub explorer: UserId,
    /// Owner of the listing
    pub vendor: UserId,
    /// Listing reference
    pub listing_id: String,
    /// Validated details
    pub details: BookingDetails,
    /// Total amount
    pub total_amount: Money,
    /// Service fee
    pub service_fee: Money,
    /// Coupon
    pub coupon: Coupon,
}

impl Booking {
    /// Builds a booking in its initial status.
    ///
    /// Accommodations start as `requested` awaiting vendor approval, every
    /// other vertical starts as `pending` awaiting payment.
    #[must_use]
    pub fn create(new: NewBooking, now: DateTime<Utc>) -> Self {
        let category = new.details.category();
        let (status, vendor_approval) = if category.requires_approval() {
            (BookingStatus::Requested, Some(VendorApproval::pending()))
        } else {
            (BookingStatus::Pending, None)
        };

        Self {
            id: BookingId::new(),
            code: generate_code(category),
            explorer: new.explorer,
            vendor: new.vendor,
            category,
            listing_id: new.listing_id,
            details: new.details,
            total_amount: new.total_amount,
            service_fee: new.service_fee,
            coupon: new.coupon,
            status,
            payment: None,
            payment_status: BookingPaymentStatus::Pending,
            payment_reference: None,
            vendor_approval,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Whether a user with `role` may read this booking
    #[must_use]
    pub fn visible_to(&self, user: UserId, role: Role) -> bool {
        match role {
            Role::Admin => true,
            Role::Vendor => self.vendor == user,
            Role::Explorer => self.explorer == user,
        }
    }
}

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// `<PREFIX>-` followed by eight uppercase alphanumerics
#[must_use]
pub fn generate_code(category: Category) -> String {
    let bytes = Uuid::new_v4().into_bytes();
    let suffix: String = bytes
        .iter()
        .take(8)
        .map(|b| char::from(CODE_ALPHABET[usize::from(*b) % CODE_ALPHABET.len()]))
        .collect();
    format!("{}-{suffix}", category.code_prefix())
}

/// Audit record for an override
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    /// Booking
    pub booking_id: BookingId,
    /// Status before
    pub from: BookingStatus,
    /// Status after
    pub to: BookingStatus,
    /// Who forced it
    pub actor: UserId,
    /// Role of the actor
    pub role: Role,
    /// Mandatory reason
    pub reason: String,
    /// When
    pub at: DateTime<Utc>,
}

// ============================================================================
// Reducer
// ============================================================================

/// Booking aggregate state as seen by the reducer
#[derive(Clone, Debug)]
pub struct BookingState {
    /// Current booking
    pub booking: Booking,
    /// Error from the last action, if it was rejected
    pub last_error: Option<TransitionError>,
    /// Audit entry produced by the last override
    pub audit: Option<StatusChange>,
}

impl BookingState {
    /// Wraps a loaded booking
    #[must_use]
    pub const fn new(booking: Booking) -> Self {
        Self {
            booking,
            last_error: None,
            audit: None,
        }
    }
}

/// Everything that can happen to a booking
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BookingAction {
    /// Vendor approves an accommodation request
    Approve {
        /// Acting vendor
        actor: UserId,
        /// Optional note
        message: Option<String>,
    },
    /// Vendor rejects an accommodation request
    Reject {
        /// Acting vendor
        actor: UserId,
        /// Optional note
        message: Option<String>,
    },
    /// A new payment attempt was started
    AttachPayment {
        /// Payment attempt
        payment_id: PaymentId,
    },
    /// The gateway verified a successful charge
    ConfirmPayment {
        /// Gateway reference
        reference: String,
        /// Amount charged
        amount: Money,
    },
    /// The gateway reported the attempt as failed or abandoned
    PaymentFailed {
        /// Gateway reference
        reference: String,
    },
    /// Vendor or admin forces a status
    OverrideStatus {
        /// Acting user
        actor: UserId,
        /// Role of the actor
        role: Role,
        /// Target status
        status: BookingStatus,
        /// Mandatory reason
        reason: String,
    },
    /// A notification effect could not be delivered
    NotificationFailed {
        /// Notification kind
        kind: &'static str,
        /// Delivery error
        error: String,
    },
}

/// Injected dependencies for [`BookingReducer`]
#[derive(Clone)]
pub struct BookingEnvironment {
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Notification channel used by effects
    pub notifier: Arc<dyn Notifier>,
}

impl BookingEnvironment {
    /// Creates a new environment
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, notifier: Arc<dyn Notifier>) -> Self {
        Self { clock, notifier }
    }
}

/// Reducer for the booking state machine
#[derive(Clone, Copy, Debug, Default)]
pub struct BookingReducer;

impl BookingReducer {
    /// Effect that delivers `notification`, reporting failures back as an action
    fn notify(env: &BookingEnvironment, notification: Notification) -> Effect<BookingAction> {
        let notifier = Arc::clone(&env.notifier);
        Effect::Future(Box::pin(async move {
            let kind = notification.kind();
            match notifier.notify(notification).await {
                Ok(()) => None,
                Err(e) => Some(BookingAction::NotificationFailed {
                    kind,
                    error: e.to_string(),
                }),
            }
        }))
    }

    fn check_decision(booking: &Booking, actor: UserId, action: &'static str) -> Result<(), TransitionError> {
        if booking.vendor != actor {
            return Err(TransitionError::NotOwner("only the listing's vendor can decide on this request"));
        }
        if let Some(approval) = &booking.vendor_approval {
            if approval.status != ApprovalStatus::Pending {
                return Err(TransitionError::AlreadyDecided(approval.status));
            }
        }
        if booking.status != BookingStatus::Requested || booking.vendor_approval.is_none() {
            return Err(TransitionError::InvalidStatus {
                action,
                status: booking.status,
            });
        }
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    fn apply(
        state: &mut BookingState,
        action: BookingAction,
        env: &BookingEnvironment,
    ) -> Result<SmallVec<[Effect<BookingAction>; 4]>, TransitionError> {
        let now = env.clock.now();
        let booking = &mut state.booking;

        match action {
            BookingAction::Approve { actor, message } => {
                Self::check_decision(booking, actor, "approve")?;
                booking.status = BookingStatus::Pending;
                booking.vendor_approval = Some(VendorApproval {
                    status: ApprovalStatus::Approved,
                    message: message.clone(),
                    approved_at: Some(now),
                    rejected_at: None,
                });
                booking.updated_at = now;
                Ok(smallvec![Self::notify(
                    env,
                    Notification::BookingApproved {
                        booking_id: booking.id,
                        code: booking.code.clone(),
                        explorer: booking.explorer,
                        message,
                    }
                )])
            },

            BookingAction::Reject { actor, message } => {
                Self::check_decision(booking, actor, "reject")?;
                booking.status = BookingStatus::Cancelled;
                booking.vendor_approval = Some(VendorApproval {
                    status: ApprovalStatus::Rejected,
                    message: message.clone(),
                    approved_at: None,
                    rejected_at: Some(now),
                });
                booking.updated_at = now;
                Ok(smallvec![Self::notify(
                    env,
                    Notification::BookingRejected {
                        booking_id: booking.id,
                        code: booking.code.clone(),
                        explorer: booking.explorer,
                        message,
                    }
                )])
            },

            BookingAction::AttachPayment { payment_id } => {
                if booking.status != BookingStatus::Pending {
                    return Err(TransitionError::InvalidStatus {
                        action: "pay for",
                        status: booking.status,
                    });
                }
                if booking.payment_status == BookingPaymentStatus::Paid {
                    return Err(TransitionError::AlreadyPaid);
                }
                booking.payment = Some(payment_id);
                booking.payment_status = BookingPaymentStatus::Pending;
                booking.updated_at = now;
                Ok(SmallVec::new())
            },

            BookingAction::ConfirmPayment { reference, amount } => match booking.status {
                BookingStatus::Pending => {
                    booking.status = BookingStatus::Confirmed;
                    booking.payment_status = BookingPaymentStatus::Paid;
                    booking.payment_reference = Some(reference.clone());
                    booking.updated_at = now;
                    Ok(smallvec![Self::notify(
                        env,
                        Notification::PaymentConfirmed {
                            booking_id: booking.id,
                            code: booking.code.clone(),
                            explorer: booking.explorer,
                            vendor: booking.vendor,
                            reference,
                            amount,
                        }
                    )])
                },
                BookingStatus::Confirmed if booking.payment_reference.as_deref() == Some(reference.as_str()) => {
                    Ok(SmallVec::new())
                },
                BookingStatus::Confirmed => Err(TransitionError::InvalidStatus {
                    action: "confirm",
                    status: booking.status,
                }),
                status @ (BookingStatus::Requested | BookingStatus::Cancelled | BookingStatus::Failed) => {
                    // Collected money stays visible on the booking; the status is left alone.
                    booking.payment_status = BookingPaymentStatus::Paid;
                    booking.payment_reference = Some(reference);
                    booking.updated_at = now;
                    state.last_error = Some(TransitionError::InvalidStatus {
                        action: "confirm",
                        status,
                    });
                    Ok(SmallVec::new())
                },
            },

            BookingAction::PaymentFailed { .. } => {
                if booking.status == BookingStatus::Pending
                    && booking.payment_status != BookingPaymentStatus::Paid
                {
                    booking.payment_status = BookingPaymentStatus::Failed;
                    booking.updated_at = now;
                }
                Ok(SmallVec::new())
            },

            BookingAction::OverrideStatus {
                actor,
                role,
                status,
                reason,
            } => {
                let allowed = match role {
                    Role::Admin => true,
                    Role::Vendor => booking.vendor == actor,
                    Role::Explorer => false,
                };
                if !allowed {
                    return Err(TransitionError::NotOwner(
                        "only an admin or the listing's vendor can override a booking status",
                    ));
                }
                let reason = reason.trim().to_string();
                if reason.is_empty() {
                    return Err(TransitionError::MissingReason);
                }
                if booking.status == status {
                    return Err(TransitionError::InvalidStatus {
                        action: "override",
                        status,
                    });
                }

                let from = booking.status;
                booking.status = status;
                booking.updated_at = now;
                state.audit = Some(StatusChange {
                    booking_id: booking.id,
                    from,
                    to: status,
                    actor,
                    role,
                    reason: reason.clone(),
                    at: now,
                });
                Ok(smallvec![Self::notify(
                    env,
                    Notification::StatusOverridden {
                        booking_id: booking.id,
                        code: booking.code.clone(),
                        explorer: booking.explorer,
                        status,
                        reason,
                    }
                )])
            },

            BookingAction::NotificationFailed { .. } => Ok(SmallVec::new()),
        }
    }
}

impl Reducer for BookingReducer {
    type State = BookingState;
    type Action = BookingAction;
    type Environment = BookingEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        state.last_error = None;
        state.audit = None;

        let snapshot = state.booking.clone();
        match Self::apply(state, action, env) {
            Ok(effects) => effects,
            Err(error) => {
                state.booking = snapshot;
                state.last_error = Some(error);
                SmallVec::new()
            },
        }
    }
}
