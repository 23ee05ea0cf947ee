//! Application state for the marketplace HTTP server.

use crate::services::{
    BookingService, CheckoutService, Collaborators, CommissionAdmin, PaymentPolicy, Reconciler, SettlementService,
    SubaccountService,
};
use axum::extract::FromRef;
use marketplace_core::store::BookingStore;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cloned per request; every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Booking lifecycle
    pub bookings: Arc<BookingService>,
    /// Checkout and payment reads
    pub checkout: Arc<CheckoutService>,
    /// Payment reconciliation
    pub reconciler: Arc<Reconciler>,
    /// Vendor sub-accounts
    pub subaccounts: Arc<SubaccountService>,
    /// Commission administration
    pub commission: Arc<CommissionAdmin>,
    /// Settlements
    pub settlements: Arc<SettlementService>,
    /// Store pinged by the readiness probe
    pub store: Arc<dyn BookingStore>,
    /// Webhook HMAC key (the gateway secret key)
    pub webhook_secret: Arc<str>,
}

impl AppState {
    /// Builds every service over the shared ports.
    #[must_use]
    pub fn new(ports: &Collaborators, policy: PaymentPolicy, webhook_secret: &str) -> Self {
        Self {
            bookings: Arc::new(BookingService::new(ports.clone())),
            checkout: Arc::new(CheckoutService::new(ports.clone(), policy)),
            reconciler: Arc::new(Reconciler::new(ports.clone())),
            subaccounts: Arc::new(SubaccountService::new(ports.clone())),
            commission: Arc::new(CommissionAdmin::new(ports.clone())),
            settlements: Arc::new(SettlementService::new(ports.clone())),
            store: ports.bookings.clone(),
            webhook_secret: Arc::from(webhook_secret),
        }
    }
}

impl FromRef<AppState> for Arc<dyn BookingStore> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}
