//! Payment gateway port.
//!
//! The shell provides an HTTP implementation; tests use a scripted mock.

use crate::BoxFuture;
use crate::error::GatewayError;
use crate::types::{FeeBearer, Money, Percentage, SettlementBatchStatus, TransactionStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result alias for gateway calls
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Routing instruction for a split payment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitInstruction {
    /// Vendor sub-account
    pub subaccount_id: String,
    /// Flat platform charge in minor units
    pub transaction_charge: Money,
    /// Who pays the gateway fee
    pub bearer: FeeBearer,
}

/// Request to open a checkout
#[derive(Clone, Debug)]
pub struct InitializeRequest {
    /// Our unique reference
    pub reference: String,
    /// Amount to charge
    pub amount: Money,
    /// Currency
    pub currency: String,
    /// Payer email
    pub email: String,
    /// Free-form metadata echoed back by the gateway
    pub metadata: serde_json::Value,
    /// Present for split payments
    pub split: Option<SplitInstruction>,
    /// Where the payer returns after checkout
    pub callback_url: Option<String>,
}

/// Opened checkout
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializedTransaction {
    /// Hosted checkout URL
    pub authorization_url: String,
    /// Checkout access code
    pub access_code: String,
    /// Reference echoed by the gateway
    pub reference: String,
}

/// Gateway-side status of a transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayStatus {
    /// Paid
    Success,
    /// Declined or errored
    Failed,
    /// Payer left the checkout
    Abandoned,
    /// Still in progress (`ongoing`, `pending`, `processing`, `queued`, ...)
    InFlight(String),
}

impl GatewayStatus {
    /// Parses the gateway's status string
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status {
            "success" => Self::Success,
            "failed" | "reversed" => Self::Failed,
            "abandoned" => Self::Abandoned,
            other => Self::InFlight(other.to_string()),
        }
    }

    /// Terminal non-success status to record, if any
    #[must_use]
    pub const fn failure_status(&self) -> Option<TransactionStatus> {
        match self {
            Self::Failed => Some(TransactionStatus::Failed),
            Self::Abandoned => Some(TransactionStatus::Abandoned),
            Self::Success | Self::InFlight(_) => None,
        }
    }
}

/// Verified state of a transaction
#[derive(Clone, Debug, PartialEq)]
pub struct TransactionSnapshot {
    /// Our reference
    pub reference: String,
    /// Gateway status
    pub status: GatewayStatus,
    /// Amount charged
    pub amount: Money,
    /// Currency
    pub currency: String,
    /// Fees charged by the gateway
    pub fees: Money,
    /// Charge time
    pub paid_at: Option<DateTime<Utc>>,
    /// Channel (card, bank, ussd, ...)
    pub channel: Option<String>,
    /// Gateway transaction id
    pub gateway_id: Option<i64>,
    /// Gateway message
    pub gateway_response: Option<String>,
    /// Raw verification payload
    pub raw: serde_json::Value,
}

/// Sub-account create/update request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubaccountRequest {
    /// Business name shown on settlements
    pub business_name: String,
    /// Bank code
    pub bank_code: String,
    /// Account number
    pub account_number: String,
    /// Platform commission on the sub-account
    pub percentage_charge: Percentage,
    /// Contact email
    pub email: Option<String>,
}

/// Sub-account as the gateway reports it
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubaccountRecord {
    /// Gateway sub-account code
    pub subaccount_id: String,
    /// Business name
    pub business_name: String,
    /// Settlement bank name
    pub settlement_bank: String,
    /// Account number
    pub account_number: String,
    /// Account holder name
    pub account_name: Option<String>,
    /// Whether the gateway considers it active
    pub active: bool,
}

/// Bank account holder lookup
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAccount {
    /// Account number
    pub account_number: String,
    /// Account holder name
    pub account_name: String,
}

/// Settlement batch as the gateway reports it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettlementReport {
    /// Gateway settlement id
    pub settlement_id: String,
    /// Sub-account paid, if any
    pub subaccount_id: Option<String>,
    /// Total settled
    pub total_amount: Money,
    /// Currency
    pub currency: String,
    /// Status
    pub status: SettlementBatchStatus,
    /// Settlement time
    pub settled_at: Option<DateTime<Utc>>,
    /// References of included payments
    pub payment_references: Vec<String>,
}

/// External payment processor
pub trait PaymentGateway: Send + Sync {
    /// Opens a checkout
    ///
    /// # Errors
    ///
    /// Any transport or gateway-side failure.
    fn initialize(&self, request: InitializeRequest) -> BoxFuture<'_, GatewayResult<InitializedTransaction>>;

    /// Verifies a transaction by reference
    ///
    /// # Errors
    ///
    /// Any transport or gateway-side failure.
    fn verify<'a>(&'a self, reference: &'a str) -> BoxFuture<'a, GatewayResult<TransactionSnapshot>>;

    /// Creates a sub-account
    ///
    /// # Errors
    ///
    /// Any transport or gateway-side failure.
    fn create_subaccount(&self, request: SubaccountRequest) -> BoxFuture<'_, GatewayResult<SubaccountRecord>>;

    /// Updates a sub-account
    ///
    /// # Errors
    ///
    /// Any transport or gateway-side failure.
    fn update_subaccount<'a>(
        &'a self,
        subaccount_id: &'a str,
        request: SubaccountRequest,
    ) -> BoxFuture<'a, GatewayResult<SubaccountRecord>>;

    /// Fetches a sub-account
    ///
    /// # Errors
    ///
    /// Any transport or gateway-side failure.
    fn fetch_subaccount<'a>(&'a self, subaccount_id: &'a str) -> BoxFuture<'a, GatewayResult<SubaccountRecord>>;

    /// Resolves the holder of a bank account
    ///
    /// # Errors
    ///
    /// Any transport or gateway-side failure, including unknown accounts.
    fn resolve_account<'a>(
        &'a self,
        account_number: &'a str,
        bank_code: &'a str,
    ) -> BoxFuture<'a, GatewayResult<ResolvedAccount>>;

    /// Lists settlement batches, optionally for one sub-account
    ///
    /// # Errors
    ///
    /// Any transport or gateway-side failure.
    fn list_settlements<'a>(
        &'a self,
        subaccount_id: Option<&'a str>,
    ) -> BoxFuture<'a, GatewayResult<Vec<SettlementReport>>>;
}
