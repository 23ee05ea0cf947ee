//! Shared value types: identifiers, money, rates and status enums.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| ValidationError::field("id", format!("'{s}' is not a valid identifier")))
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a booking
    BookingId
);
uuid_id!(
    /// Unique identifier for a payment attempt
    PaymentId
);
uuid_id!(
    /// Identifier of a platform user (explorer, vendor or admin)
    UserId
);
uuid_id!(
    /// Identifier of an active configuration version row
    ConfigurationId
);

// ============================================================================
// Money and rates
// ============================================================================

/// Amount in minor currency units (kobo, cents).
///
/// All arithmetic is integral; fractional rates are applied through
/// [`Percentage::of`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Creates an amount from minor units
    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns the amount in minor units
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Whether the amount is strictly positive
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Whether the amount is negative
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Checked addition
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Saturating subtraction
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl std::ops::Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, m| acc + m)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

/// Rate expressed in basis points (1% = 100 bps), bounded to `0..=10_000`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Percentage(u32);

impl Percentage {
    /// One hundred percent
    pub const MAX_BPS: u32 = 10_000;

    /// Creates a rate from basis points
    ///
    /// # Errors
    ///
    /// Returns a validation error when the rate exceeds 100%.
    pub fn from_bps(bps: u32) -> Result<Self, ValidationError> {
        if bps > Self::MAX_BPS {
            return Err(ValidationError::field(
                "commissionRate",
                format!("{bps} bps exceeds 100%"),
            ));
        }
        Ok(Self(bps))
    }

    /// Parses a decimal percentage such as `5` or `7.5`
    ///
    /// # Errors
    ///
    /// Returns a validation error for NaN, negative values, values above 100,
    /// or precision finer than one basis point.
    pub fn from_percent(percent: f64) -> Result<Self, ValidationError> {
        if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
            return Err(ValidationError::field(
                "commissionRate",
                format!("{percent} must be between 0 and 100"),
            ));
        }
        let scaled = percent * 100.0;
        let rounded = scaled.round();
        if (scaled - rounded).abs() > 1e-6 {
            return Err(ValidationError::field(
                "commissionRate",
                format!("{percent} has more than two decimal places"),
            ));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Self::from_bps(rounded as u32)
    }

    /// Basis points
    #[must_use]
    pub const fn bps(self) -> u32 {
        self.0
    }

    /// Decimal percentage, as the gateway and HTTP clients expect it
    #[must_use]
    pub fn as_percent(self) -> f64 {
        f64::from(self.0) / 100.0
    }

    /// Applies the rate to an amount, rounding half away from zero
    #[must_use]
    pub fn of(self, amount: Money) -> Money {
        let product = i128::from(amount.minor()) * i128::from(self.0);
        let denom = i128::from(Self::MAX_BPS);
        let half = denom / 2;
        let rounded = if product >= 0 {
            (product + half) / denom
        } else {
            (product - half) / denom
        };
        // |amount| * bps / 10_000 never exceeds |amount|
        #[allow(clippy::cast_possible_truncation)]
        Money::from_minor(rounded as i64)
    }
}

impl TryFrom<u32> for Percentage {
    type Error = ValidationError;

    fn try_from(bps: u32) -> Result<Self, Self::Error> {
        Self::from_bps(bps)
    }
}

impl From<Percentage> for u32 {
    fn from(p: Percentage) -> Self {
        p.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Enumerations
// ============================================================================

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Wire and storage representation
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ValidationError::field($field, format!("unknown value '{other}'"))),
                }
            }
        }
    };
}

string_enum!(
    /// Marketplace vertical a listing and its bookings belong to
    Category, "category" {
        /// Ticketed events
        Events => "events",
        /// Stays with check-in and check-out
        Accommodations => "accommodations",
        /// Leisure activities
        Leisure => "leisure",
        /// Cinema showings
        MoviesAndCinema => "movies_and_cinema",
    }
);

impl Category {
    /// Prefix of human-facing booking codes for this vertical
    #[must_use]
    pub const fn code_prefix(self) -> &'static str {
        match self {
            Self::Events => "EVT",
            Self::Accommodations => "ACC",
            Self::Leisure => "LSR",
            Self::MoviesAndCinema => "MOV",
        }
    }

    /// Whether bookings in this vertical wait for vendor approval
    #[must_use]
    pub const fn requires_approval(self) -> bool {
        matches!(self, Self::Accommodations)
    }
}

string_enum!(
    /// Lifecycle status of a booking
    BookingStatus, "status" {
        /// Awaiting vendor approval (accommodations only)
        Requested => "requested",
        /// Awaiting payment
        Pending => "pending",
        /// Paid and confirmed
        Confirmed => "confirmed",
        /// Rejected or cancelled
        Cancelled => "cancelled",
        /// Failed, set by an administrative override only
        Failed => "failed",
    }
);

impl BookingStatus {
    /// Whether the normal flow can no longer move the booking
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Cancelled | Self::Failed)
    }
}

string_enum!(
    /// Booking-level view of its payment
    BookingPaymentStatus, "paymentStatus" {
        /// No successful payment yet
        Pending => "pending",
        /// A payment succeeded
        Paid => "paid",
        /// The latest attempt failed
        Failed => "failed",
    }
);

string_enum!(
    /// Vendor decision on an accommodation request
    ApprovalStatus, "approvalStatus" {
        /// Not decided yet
        Pending => "pending",
        /// Approved by the vendor
        Approved => "approved",
        /// Rejected by the vendor
        Rejected => "rejected",
    }
);

string_enum!(
    /// Role carried by an authenticated session
    Role, "role" {
        /// Customer making bookings
        Explorer => "explorer",
        /// Listing owner
        Vendor => "vendor",
        /// Platform operator
        Admin => "admin",
    }
);

string_enum!(
    /// Status of a payment attempt
    TransactionStatus, "status" {
        /// Initialized, not yet verified
        Pending => "pending",
        /// Verified as paid with the gateway
        Success => "success",
        /// Declined or errored at the gateway
        Failed => "failed",
        /// Payer left the checkout
        Abandoned => "abandoned",
        /// Charged after another attempt had already paid the booking;
        /// owed back to the payer and never settled to the vendor
        Duplicate => "duplicate",
    }
);

string_enum!(
    /// Payout state of a successful payment
    SettlementStatus, "settlementStatus" {
        /// Not yet paid out to the vendor
        Pending => "pending",
        /// Included in a successful settlement batch
        Settled => "settled",
        /// Included in a failed settlement batch
        Failed => "failed",
    }
);

string_enum!(
    /// Status of a gateway settlement batch
    SettlementBatchStatus, "status" {
        /// Scheduled
        Pending => "pending",
        /// Paid out
        Success => "success",
        /// Payout failed
        Failed => "failed",
        /// Cancelled by the gateway
        Cancelled => "cancelled",
    }
);

string_enum!(
    /// Status of a vendor's gateway sub-account
    SubaccountStatus, "subaccountStatus" {
        /// Creation in progress
        Pending => "pending",
        /// Accepting split payments
        Active => "active",
        /// Disabled at the gateway
        Inactive => "inactive",
        /// Suspended by an administrator
        Suspended => "suspended",
    }
);

string_enum!(
    /// Who absorbs gateway fees on split payments
    FeeBearer, "feeBearer" {
        /// Fees come out of the vendor's share
        Vendor => "vendor",
        /// Fees come out of the platform's commission
        Platform => "platform",
    }
);

impl Default for FeeBearer {
    fn default() -> Self {
        Self::Vendor
    }
}
