//! Payment attempts and the split computed when one succeeds.

use crate::commission::Split;
use crate::types::{
    BookingId, Category, FeeBearer, Money, PaymentId, Percentage, SettlementStatus,
    TransactionStatus, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Commission and routing snapshot taken at initialization.
///
/// Confirmation computes amounts from this snapshot, never from the
/// configuration in force at confirmation time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMetadata {
    /// Vertical of the booking
    pub category: Category,
    /// Effective commission rate
    pub commission_rate: Percentage,
    /// Commission in minor units
    pub commission: Money,
    /// Whether the charge was routed as a split payment
    pub split: bool,
    /// Sub-account the vendor share was routed to
    pub subaccount_id: Option<String>,
    /// Fee bearer chosen at initialization
    pub fee_bearer: FeeBearer,
    /// Checkout access code
    pub access_code: Option<String>,
    /// Gateway's numeric transaction id, known after verification
    #[serde(default)]
    pub gateway_transaction_id: Option<i64>,
}

/// One gateway transaction attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Identifier
    pub id: PaymentId,
    /// Booking being paid for
    pub booking_id: BookingId,
    /// Listing owner
    pub vendor: UserId,
    /// Payer
    pub explorer: UserId,
    /// Unique gateway reference
    pub reference: String,
    /// Amount charged
    pub amount: Money,
    /// ISO currency
    pub currency: String,
    /// Attempt status; `success` is terminal
    pub status: TransactionStatus,
    /// Channel reported by the gateway (card, bank, ...)
    pub payment_method: Option<String>,
    /// Payer email
    pub customer_email: String,
    /// Payer name
    pub customer_name: Option<String>,
    /// Snapshot taken at initialization
    pub metadata: PaymentMetadata,
    /// When the charge succeeded
    pub paid_at: Option<DateTime<Utc>>,
    /// Settlement batch that paid the vendor
    pub settlement_id: Option<String>,
    /// Payout status
    pub settlement_status: SettlementStatus,
    /// Vendor share
    pub vendor_amount: Money,
    /// Platform share
    pub platform_amount: Money,
    /// Gateway fees
    pub gateway_fees: Money,
    /// Last gateway message for this attempt
    pub gateway_response: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
}

/// Data needed to open a payment attempt
#[derive(Clone, Debug)]
pub struct NewPayment {
    /// Booking being paid for
    pub booking_id: BookingId,
    /// Listing owner
    pub vendor: UserId,
    /// Payer
    pub explorer: UserId,
    /// Gateway reference
    pub reference: String,
    /// Amount
    pub amount: Money,
    /// Currency
    pub currency: String,
    /// Payer email
    pub customer_email: String,
    /// Payer name
    pub customer_name: Option<String>,
    /// Snapshot
    pub metadata: PaymentMetadata,
}

impl Payment {
    /// Opens a pending attempt
    #[must_use]
    pub fn open(new: NewPayment, now: DateTime<Utc>) -> Self {
        Self {
            id: PaymentId::new(),
            booking_id: new.booking_id,
            vendor: new.vendor,
            explorer: new.explorer,
            reference: new.reference,
            amount: new.amount,
            currency: new.currency,
            status: TransactionStatus::Pending,
            payment_method: None,
            customer_email: new.customer_email,
            customer_name: new.customer_name,
            metadata: new.metadata,
            paid_at: None,
            settlement_id: None,
            settlement_status: SettlementStatus::Pending,
            vendor_amount: Money::ZERO,
            platform_amount: Money::ZERO,
            gateway_fees: Money::ZERO,
            gateway_response: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// New unique gateway reference, e.g. `BKG-3F2A...`
#[must_use]
pub fn new_reference() -> String {
    format!("BKG-{}", uuid::Uuid::new_v4().simple()).to_uppercase()
}

/// Everything written when a payment is confirmed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentConfirmation {
    /// Gateway reference
    pub reference: String,
    /// Charge time reported by the gateway
    pub paid_at: DateTime<Utc>,
    /// Channel reported by the gateway
    pub channel: Option<String>,
    /// Gateway transaction id
    pub gateway_transaction_id: Option<i64>,
    /// Gateway message
    pub gateway_response: Option<String>,
    /// Computed shares
    pub split: Split,
}

/// Everything written when an attempt did not succeed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentFailure {
    /// Gateway reference
    pub reference: String,
    /// `failed` or `abandoned`
    pub status: TransactionStatus,
    /// Gateway message
    pub gateway_response: Option<String>,
}
