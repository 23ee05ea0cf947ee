//! Vendor payout profile: sub-account and commission override.

use crate::types::{Category, Percentage, SubaccountStatus, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Bank account behind a sub-account
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDetails {
    /// Ten-digit account number
    pub account_number: String,
    /// Bank code
    pub bank_code: String,
    /// Account holder name
    pub account_name: Option<String>,
    /// Bank name
    pub bank_name: Option<String>,
}

/// Gateway sub-account embedded on the vendor record
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subaccount {
    /// Gateway sub-account code
    pub subaccount_id: String,
    /// Status
    pub status: SubaccountStatus,
    /// Business name registered with the gateway
    pub business_name: String,
    /// Settlement bank name
    pub settlement_bank: String,
    /// Bank account
    pub bank_details: BankDetails,
    /// Last successful verification with the gateway
    pub last_verified_at: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
}

impl Subaccount {
    /// Whether split payments may be routed to it
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SubaccountStatus::Active
    }
}

/// Payout-related part of a vendor's user record
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorProfile {
    /// Vendor user id
    pub id: UserId,
    /// Vertical the vendor primarily sells in
    pub vendor_account_preference: Option<Category>,
    /// Custom commission overriding the standard rate
    pub commission_rate: Option<Percentage>,
    /// Gateway sub-account
    pub subaccount: Option<Subaccount>,
}

impl VendorProfile {
    /// Profile with no sub-account and no override
    #[must_use]
    pub const fn new(id: UserId, preference: Option<Category>) -> Self {
        Self {
            id,
            vendor_account_preference: preference,
            commission_rate: None,
            subaccount: None,
        }
    }

    /// Active sub-account, if split payments are possible
    #[must_use]
    pub fn active_subaccount(&self) -> Option<&Subaccount> {
        self.subaccount.as_ref().filter(|s| s.is_active())
    }
}
