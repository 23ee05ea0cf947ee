//! API endpoints for the marketplace.
//!
//! Handlers are thin: they parse the request, call one service and map the
//! result. Every handler except the webhook takes a [`SessionUser`].
//!
//! [`SessionUser`]: crate::auth::SessionUser

pub mod admin;
pub mod bookings;
pub mod payments;
pub mod settlements;
pub mod subaccounts;
pub mod webhook;

pub use admin::{get_configuration, ingest_settlement, set_vendor_commission, sync_settlements, update_configuration};
pub use bookings::{
    approve_booking, booking_history, create_booking, get_booking, list_bookings, override_status, reject_booking,
};
pub use payments::{initialize_payment, list_payments, payment_status, verify_payment};
pub use settlements::{list_settlements, settlement_summary};
pub use subaccounts::{create_subaccount, get_subaccount, resolve_account, update_subaccount};
pub use webhook::paystack_webhook;
