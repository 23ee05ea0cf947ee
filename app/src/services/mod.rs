//! Application services.
//!
//! Each service orchestrates the domain core against the persistence ports
//! and the payment gateway. Services take a [`SessionUser`](crate::auth::SessionUser)
//! and enforce role checks themselves, so handlers stay thin.

pub mod bookings;
pub mod checkout;
pub mod commission;
pub mod effects;
pub mod reconciler;
pub mod settlements;
pub mod subaccounts;

pub use bookings::{BookingQuery, BookingService, CouponInput, CreateBooking};
pub use checkout::{CheckoutService, PaymentQuery};
pub use commission::{CommissionAdmin, RatesInput, VendorRateChange};
pub use reconciler::{ReconcileOutcome, ReconcileReport, Reconciler};
pub use settlements::{SettlementService, SyncSummary};
pub use subaccounts::{SubaccountInput, SubaccountService};

use marketplace_core::environment::Clock;
use marketplace_core::gateway::PaymentGateway;
use marketplace_core::listing::ListingDirectory;
use marketplace_core::notify::Notifier;
use marketplace_core::store::{
    BookingStore, ConfigurationStore, PaymentStore, SettlementStore, VendorStore,
};
use marketplace_core::types::FeeBearer;
use std::sync::Arc;

/// Ports shared by every service
#[derive(Clone)]
pub struct Collaborators {
    /// Bookings and their audit trail
    pub bookings: Arc<dyn BookingStore>,
    /// Payment attempts
    pub payments: Arc<dyn PaymentStore>,
    /// Vendor profiles and sub-accounts
    pub vendors: Arc<dyn VendorStore>,
    /// Commission configuration versions
    pub configurations: Arc<dyn ConfigurationStore>,
    /// Settlement batches
    pub settlements: Arc<dyn SettlementStore>,
    /// Listing lookup
    pub listings: Arc<dyn ListingDirectory>,
    /// Payment gateway
    pub gateway: Arc<dyn PaymentGateway>,
    /// Notification channel
    pub notifier: Arc<dyn Notifier>,
    /// Time source
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Wires every persistence port to one store.
    #[must_use]
    pub fn with_store<S>(
        store: Arc<S>,
        listings: Arc<dyn ListingDirectory>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self
    where
        S: BookingStore + PaymentStore + VendorStore + ConfigurationStore + SettlementStore + 'static,
    {
        Self {
            bookings: store.clone(),
            payments: store.clone(),
            vendors: store.clone(),
            configurations: store.clone(),
            settlements: store,
            listings,
            gateway,
            notifier,
            clock,
        }
    }
}

/// Checkout policy
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentPolicy {
    /// Who bears gateway fees on split payments
    pub fee_bearer: FeeBearer,
    /// Charge currency
    pub currency: String,
    /// Where the payer returns after checkout
    pub callback_url: Option<String>,
}

impl Default for PaymentPolicy {
    fn default() -> Self {
        Self {
            fee_bearer: FeeBearer::Vendor,
            currency: "NGN".to_string(),
            callback_url: None,
        }
    }
}

/// Largest page a list endpoint returns
pub const MAX_PAGE_SIZE: u32 = 100;

/// Clamps a requested page size to `1..=MAX_PAGE_SIZE`.
#[must_use]
pub fn page_size(requested: Option<u32>) -> u32 {
    requested
        .unwrap_or(marketplace_core::store::DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_clamped() {
        assert_eq!(page_size(None), 50);
        assert_eq!(page_size(Some(0)), 1);
        assert_eq!(page_size(Some(20)), 20);
        assert_eq!(page_size(Some(10_000)), MAX_PAGE_SIZE);
    }
}
