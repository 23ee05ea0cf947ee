//! Persistence ports.
//!
//! Every state transition that must not happen twice is expressed as a
//! single guarded call, so implementations can make it atomic (one SQL
//! transaction, one lock) and callers never read-then-write across calls.
//!
//! The traits are dyn-compatible: methods return boxed futures so stores can
//! be shared as `Arc<dyn BookingStore>` and friends.

use crate::BoxFuture;
use crate::booking::{Booking, StatusChange};
use crate::commission::{CommissionRates, Configuration};
use crate::error::StoreError;
use crate::payment::{Payment, PaymentConfirmation, PaymentFailure};
use crate::settlement::{Settlement, SettlementSummary};
use crate::types::{
    BookingId, BookingStatus, Category, Percentage, TransactionStatus, UserId,
};
use crate::vendor::{Subaccount, VendorProfile};
use chrono::{DateTime, Utc};

/// Result alias for store calls
pub type StoreResult<T> = Result<T, StoreError>;

/// Default page size for list queries
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Booking list filter
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingFilter {
    /// Only bookings made by this explorer
    pub explorer: Option<UserId>,
    /// Only bookings on this vendor's listings
    pub vendor: Option<UserId>,
    /// Only bookings in this status
    pub status: Option<BookingStatus>,
    /// Only bookings in this vertical
    pub category: Option<Category>,
    /// Page size
    pub limit: u32,
    /// Rows to skip
    pub offset: u32,
}

impl Default for BookingFilter {
    fn default() -> Self {
        Self {
            explorer: None,
            vendor: None,
            status: None,
            category: None,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl BookingFilter {
    /// Whether `booking` passes the filter, ignoring paging
    #[must_use]
    pub fn matches(&self, booking: &Booking) -> bool {
        self.explorer.is_none_or(|e| booking.explorer == e)
            && self.vendor.is_none_or(|v| booking.vendor == v)
            && self.status.is_none_or(|s| booking.status == s)
            && self.category.is_none_or(|c| booking.category == c)
    }
}

/// Payment list filter
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentFilter {
    /// Only payments made by this explorer
    pub explorer: Option<UserId>,
    /// Only payments to this vendor
    pub vendor: Option<UserId>,
    /// Only attempts for this booking
    pub booking_id: Option<BookingId>,
    /// Only attempts in this status
    pub status: Option<TransactionStatus>,
    /// Page size
    pub limit: u32,
    /// Rows to skip
    pub offset: u32,
}

impl Default for PaymentFilter {
    fn default() -> Self {
        Self {
            explorer: None,
            vendor: None,
            booking_id: None,
            status: None,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl PaymentFilter {
    /// Whether `payment` passes the filter, ignoring paging
    #[must_use]
    pub fn matches(&self, payment: &Payment) -> bool {
        self.explorer.is_none_or(|e| payment.explorer == e)
            && self.vendor.is_none_or(|v| payment.vendor == v)
            && self.booking_id.is_none_or(|b| payment.booking_id == b)
            && self.status.is_none_or(|s| payment.status == s)
    }
}

/// Booking state to write alongside a confirmation.
///
/// Only the status and payment columns are taken from `booking`; the rest
/// of the stored row is left as it is.
#[derive(Clone, Debug)]
pub struct BookingTransition {
    /// Booking as it should look afterwards
    pub booking: Booking,
    /// Status the booking must still be in for the write to apply
    pub expected: BookingStatus,
}

/// Result of [`PaymentStore::confirm_payment`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Payment moved to success and the booking transition was written
    Applied,
    /// Another caller already moved the payment to success; nothing written
    AlreadySucceeded,
    /// Payment moved to success but the booking had changed status in the
    /// meantime; only its payment fields were written
    BookingConflict {
        /// Status found on the booking, if it still exists
        status: Option<BookingStatus>,
    },
    /// Another attempt already paid the booking. The charge was recorded as
    /// `duplicate` with no vendor share and the booking was not touched.
    Duplicate {
        /// Reference of the attempt that paid the booking
        paid_by: String,
    },
    /// No payment carries the reference
    UnknownReference,
}

/// Result of [`SettlementStore::upsert_settlement`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SettlementUpsert {
    /// The batch was seen for the first time
    pub created: bool,
    /// Payments whose settlement status changed
    pub payments_updated: u64,
}

/// Booking persistence
pub trait BookingStore: Send + Sync {
    /// Inserts a new booking
    ///
    /// # Errors
    ///
    /// [`StoreError::Duplicate`] if the id or code exists.
    fn insert_booking(&self, booking: Booking) -> BoxFuture<'_, StoreResult<()>>;

    /// Loads a booking
    ///
    /// # Errors
    ///
    /// Database failures.
    fn get_booking(&self, id: BookingId) -> BoxFuture<'_, StoreResult<Option<Booking>>>;

    /// Lists bookings, newest first
    ///
    /// # Errors
    ///
    /// Database failures.
    fn list_bookings(&self, filter: BookingFilter) -> BoxFuture<'_, StoreResult<Vec<Booking>>>;

    /// Writes `booking` if the stored row is still at `booking.version`,
    /// together with the audit entry if one is given, and bumps the version.
    /// Returns `false` when another write got there first.
    ///
    /// # Errors
    ///
    /// Database failures.
    fn update_booking(&self, booking: Booking, audit: Option<StatusChange>) -> BoxFuture<'_, StoreResult<bool>>;

    /// Override history of a booking, oldest first
    ///
    /// # Errors
    ///
    /// Database failures.
    fn status_history(&self, id: BookingId) -> BoxFuture<'_, StoreResult<Vec<StatusChange>>>;

    /// Cheap connectivity check
    ///
    /// # Errors
    ///
    /// The store is unreachable.
    fn ping(&self) -> BoxFuture<'_, StoreResult<()>>;
}

/// Payment persistence
pub trait PaymentStore: Send + Sync {
    /// Inserts `payment` and points `booking` at it, provided the booking is
    /// still `pending` and not paid. Returns `false` when the guard did not
    /// match; nothing is written in that case.
    ///
    /// # Errors
    ///
    /// [`StoreError::Duplicate`] on a reference collision.
    fn open_attempt(&self, payment: Payment, booking: Booking) -> BoxFuture<'_, StoreResult<bool>>;

    /// Finds an attempt by gateway reference
    ///
    /// # Errors
    ///
    /// Database failures.
    fn find_by_reference<'a>(&'a self, reference: &'a str) -> BoxFuture<'a, StoreResult<Option<Payment>>>;

    /// Lists attempts, newest first
    ///
    /// # Errors
    ///
    /// Database failures.
    fn list_payments(&self, filter: PaymentFilter) -> BoxFuture<'_, StoreResult<Vec<Payment>>>;

    /// Moves the attempt to `success` and applies the booking transition in
    /// one atomic step. The payment write is guarded on its status not
    /// already being `success`; losing that race writes nothing. A booking
    /// holds at most one `success` attempt: when another attempt already
    /// paid it, this one is recorded as `duplicate` instead.
    ///
    /// # Errors
    ///
    /// Database failures; nothing is written.
    fn confirm_payment(
        &self,
        confirmation: PaymentConfirmation,
        transition: BookingTransition,
    ) -> BoxFuture<'_, StoreResult<ConfirmOutcome>>;

    /// Records a terminal non-success outcome on a `pending` attempt.
    /// Returns `false` if the attempt was not pending.
    ///
    /// # Errors
    ///
    /// Database failures.
    fn record_failure(&self, failure: PaymentFailure) -> BoxFuture<'_, StoreResult<bool>>;
}

/// Vendor payout profiles
pub trait VendorStore: Send + Sync {
    /// Loads a vendor's profile
    ///
    /// # Errors
    ///
    /// Database failures.
    fn get_vendor(&self, id: UserId) -> BoxFuture<'_, StoreResult<Option<VendorProfile>>>;

    /// Finds the vendor owning a sub-account
    ///
    /// # Errors
    ///
    /// Database failures.
    fn find_by_subaccount<'a>(
        &'a self,
        subaccount_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<VendorProfile>>>;

    /// Vendors holding a sub-account
    ///
    /// # Errors
    ///
    /// Database failures.
    fn list_subaccount_vendors(&self) -> BoxFuture<'_, StoreResult<Vec<VendorProfile>>>;

    /// Claims the right to create a sub-account. Creates the profile if
    /// missing. Returns `false` when a sub-account exists or another
    /// creation is in progress.
    ///
    /// # Errors
    ///
    /// Database failures.
    fn reserve_subaccount(
        &self,
        id: UserId,
        preference: Option<Category>,
    ) -> BoxFuture<'_, StoreResult<bool>>;

    /// Drops a reservation after a failed creation
    ///
    /// # Errors
    ///
    /// Database failures.
    fn release_subaccount(&self, id: UserId) -> BoxFuture<'_, StoreResult<()>>;

    /// Stores the sub-account on the profile
    ///
    /// # Errors
    ///
    /// Database failures.
    fn save_subaccount(&self, id: UserId, subaccount: Subaccount) -> BoxFuture<'_, StoreResult<()>>;

    /// Sets or clears the custom commission, creating the profile if missing
    ///
    /// # Errors
    ///
    /// Database failures.
    fn set_commission_rate(
        &self,
        id: UserId,
        rate: Option<Percentage>,
    ) -> BoxFuture<'_, StoreResult<VendorProfile>>;
}

/// Platform configuration versions
pub trait ConfigurationStore: Send + Sync {
    /// The active configuration, if any
    ///
    /// # Errors
    ///
    /// Database failures.
    fn active_configuration(&self) -> BoxFuture<'_, StoreResult<Option<Configuration>>>;

    /// Deactivates the current version and activates a new one with
    /// `version + 1`, atomically.
    ///
    /// # Errors
    ///
    /// Database failures; the previous version stays active.
    fn activate_configuration(
        &self,
        rates: CommissionRates,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> BoxFuture<'_, StoreResult<Configuration>>;
}

/// Settlement batches
pub trait SettlementStore: Send + Sync {
    /// Inserts or updates a batch by settlement id, links its payments by
    /// reference and, for final batches, updates their settlement status.
    ///
    /// # Errors
    ///
    /// Database failures; nothing is written.
    fn upsert_settlement(&self, settlement: Settlement) -> BoxFuture<'_, StoreResult<SettlementUpsert>>;

    /// Lists batches, newest first, optionally for one vendor
    ///
    /// # Errors
    ///
    /// Database failures.
    fn list_settlements(&self, vendor: Option<UserId>) -> BoxFuture<'_, StoreResult<Vec<Settlement>>>;

    /// Totals per status and pending payout, optionally for one vendor
    ///
    /// # Errors
    ///
    /// Database failures.
    fn settlement_summary(&self, vendor: Option<UserId>) -> BoxFuture<'_, StoreResult<SettlementSummary>>;
}
