//! Router configuration for the marketplace.
//!
//! Builds the complete Axum router with all endpoints.

use super::state::AppState;
use crate::api::{admin, bookings, payments, settlements, subaccounts, webhook};
use axum::{
    Router,
    routing::{get, post, put},
};
use marketplace_web::correlation_id_layer;
use marketplace_web::handlers::{health_check, readiness_check};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Default request body limit (256 KiB)
pub const DEFAULT_BODY_LIMIT: usize = 256 * 1024;

/// Build the complete Axum router with the default body limit.
pub fn build_router(state: AppState) -> Router {
    build_router_with(state, DEFAULT_BODY_LIMIT)
}

/// Build the complete Axum router.
///
/// Configures:
/// - Health checks (no session)
/// - Booking lifecycle endpoints
/// - Checkout, verification and the gateway webhook
/// - Vendor sub-accounts
/// - Settlement reads and admin endpoints
///
/// Every request passes through the correlation-id middleware and a trace
/// span; bodies larger than `body_limit` bytes are refused.
pub fn build_router_with(state: AppState, body_limit: usize) -> Router {
    let api_routes = Router::new()
        // Bookings
        .route("/bookings", post(bookings::create_booking).get(bookings::list_bookings))
        .route("/bookings/:id", get(bookings::get_booking))
        .route("/bookings/:id/history", get(bookings::booking_history))
        .route("/bookings/:id/approve", post(bookings::approve_booking))
        .route("/bookings/:id/reject", post(bookings::reject_booking))
        .route("/bookings/:id/status", post(bookings::override_status))
        // Payments
        .route("/initialize-payment", post(payments::initialize_payment))
        .route("/verify-payment", post(payments::verify_payment))
        .route("/payment-status", get(payments::payment_status))
        .route("/payments", get(payments::list_payments))
        // Gateway webhook (signature, no session)
        .route("/webhooks/paystack", post(webhook::paystack_webhook))
        // Vendor sub-accounts
        .route("/banks/resolve", get(subaccounts::resolve_account))
        .route(
            "/subaccounts",
            post(subaccounts::create_subaccount)
                .put(subaccounts::update_subaccount)
                .get(subaccounts::get_subaccount),
        )
        // Settlements
        .route("/settlements", get(settlements::list_settlements))
        .route("/settlements/summary", get(settlements::settlement_summary))
        // Admin
        .route(
            "/admin/configuration",
            get(admin::get_configuration).put(admin::update_configuration),
        )
        .route("/admin/vendors/:id/commission", put(admin::set_vendor_commission))
        .route("/admin/settlements", post(admin::ingest_settlement))
        .route("/admin/settlements/sync", post(admin::sync_settlements));

    Router::new()
        // Health checks (no session)
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api_routes)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}
