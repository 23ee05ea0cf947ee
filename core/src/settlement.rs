//! Settlement batches and payout summaries.

use crate::payment::Payment;
use crate::types::{Money, SettlementBatchStatus, SettlementStatus, TransactionStatus, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A gateway payout batch
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    /// Gateway settlement id, unique
    pub settlement_id: String,
    /// Vendor paid out, when the batch targets one sub-account
    pub vendor: Option<UserId>,
    /// Sub-account the batch paid
    pub subaccount_id: Option<String>,
    /// Total settled
    pub total_amount: Money,
    /// Currency
    pub currency: String,
    /// Batch status
    pub status: SettlementBatchStatus,
    /// When the gateway settled it
    pub settled_at: Option<DateTime<Utc>>,
    /// References of the payments in the batch
    pub payment_references: Vec<String>,
    /// First time we saw the batch
    pub created_at: DateTime<Utc>,
    /// Last update
    pub updated_at: DateTime<Utc>,
}

impl Settlement {
    /// Payout status the batch implies for its payments, if final
    #[must_use]
    pub const fn payment_status(&self) -> Option<SettlementStatus> {
        match self.status {
            SettlementBatchStatus::Success => Some(SettlementStatus::Settled),
            SettlementBatchStatus::Failed | SettlementBatchStatus::Cancelled => {
                Some(SettlementStatus::Failed)
            },
            SettlementBatchStatus::Pending => None,
        }
    }
}

/// Count and total of settlements in one status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTotal {
    /// Number of batches
    pub count: u64,
    /// Sum of batch totals
    pub amount: Money,
}

/// Settlement overview for a vendor or the whole platform
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementSummary {
    /// Batches paid out
    pub settled: StatusTotal,
    /// Batches scheduled
    pub pending: StatusTotal,
    /// Batches failed or cancelled
    pub failed: StatusTotal,
    /// Vendor share of successful payments not yet settled
    pub pending_payout: Money,
    /// Number of successful payments not yet settled
    pub pending_payments: u64,
}

impl SettlementSummary {
    /// Aggregates batches and payments already filtered to one scope.
    ///
    /// Pending payout is the sum of `vendor_amount` over successful payments
    /// whose settlement status is still pending.
    #[must_use]
    pub fn compute<'a>(
        settlements: impl IntoIterator<Item = &'a Settlement>,
        payments: impl IntoIterator<Item = &'a Payment>,
    ) -> Self {
        let mut summary = Self::default();
        for settlement in settlements {
            let bucket = match settlement.status {
                SettlementBatchStatus::Success => &mut summary.settled,
                SettlementBatchStatus::Pending => &mut summary.pending,
                SettlementBatchStatus::Failed | SettlementBatchStatus::Cancelled => {
                    &mut summary.failed
                },
            };
            bucket.count += 1;
            bucket.amount = bucket.amount + settlement.total_amount;
        }
        for payment in payments {
            if payment.status == TransactionStatus::Success
                && payment.settlement_status == SettlementStatus::Pending
            {
                summary.pending_payout = summary.pending_payout + payment.vendor_amount;
                summary.pending_payments += 1;
            }
        }
        summary
    }
}
