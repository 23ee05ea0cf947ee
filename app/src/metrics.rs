//! Business metrics for the payment flow.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `marketplace.payments.initialized` - Checkouts opened at the gateway
//! - `marketplace.payments.confirmed` - Payments moved to success
//! - `marketplace.payments.duplicate_confirmations` - Success signals for already confirmed payments
//! - `marketplace.payments.duplicate_charges` - Charges on bookings another attempt already paid
//! - `marketplace.payments.failed{status}` - Attempts recorded as failed or abandoned
//! - `marketplace.webhooks.rejected` - Webhooks refused for a bad signature
//! - `marketplace.notifications.failed{kind}` - Notifications that could not be delivered

use metrics::describe_counter;

/// Checkouts opened at the gateway
pub const PAYMENTS_INITIALIZED: &str = "marketplace.payments.initialized";
/// Payments moved to success
pub const PAYMENTS_CONFIRMED: &str = "marketplace.payments.confirmed";
/// Repeated success signals
pub const DUPLICATE_CONFIRMATIONS: &str = "marketplace.payments.duplicate_confirmations";
/// Charges on already paid bookings
pub const DUPLICATE_CHARGES: &str = "marketplace.payments.duplicate_charges";
/// Attempts recorded as failed or abandoned
pub const PAYMENTS_FAILED: &str = "marketplace.payments.failed";
/// Webhooks refused for a bad signature
pub const WEBHOOKS_REJECTED: &str = "marketplace.webhooks.rejected";
/// Undeliverable notifications
pub const NOTIFICATIONS_FAILED: &str = "marketplace.notifications.failed";

/// Register metric descriptions. Call once at startup, after the recorder
/// is installed.
pub fn register_business_metrics() {
    describe_counter!(PAYMENTS_INITIALIZED, "Checkouts opened at the payment gateway");
    describe_counter!(PAYMENTS_CONFIRMED, "Payments moved to success");
    describe_counter!(
        DUPLICATE_CONFIRMATIONS,
        "Success signals received for payments that were already confirmed"
    );
    describe_counter!(
        DUPLICATE_CHARGES,
        "Successful charges on bookings that another attempt had already paid"
    );
    describe_counter!(PAYMENTS_FAILED, "Payment attempts recorded as failed or abandoned");
    describe_counter!(WEBHOOKS_REJECTED, "Webhook deliveries refused for a bad signature");
    describe_counter!(NOTIFICATIONS_FAILED, "Notifications that could not be delivered");

    tracing::info!("Business metrics registered");
}

/// Record a checkout opened at the gateway.
pub fn record_payment_initialized(split: bool) {
    metrics::counter!(PAYMENTS_INITIALIZED, "split" => if split { "true" } else { "false" }).increment(1);
}

/// Record a payment confirmation.
pub fn record_payment_confirmed() {
    metrics::counter!(PAYMENTS_CONFIRMED).increment(1);
}

/// Record a success signal for an already confirmed payment.
pub fn record_duplicate_confirmation() {
    metrics::counter!(DUPLICATE_CONFIRMATIONS).increment(1);
}

/// Record a charge on a booking another attempt already paid.
pub fn record_duplicate_charge() {
    metrics::counter!(DUPLICATE_CHARGES).increment(1);
}

/// Record a failed or abandoned attempt.
pub fn record_payment_failed(status: &'static str) {
    metrics::counter!(PAYMENTS_FAILED, "status" => status).increment(1);
}

/// Record a webhook refused for its signature.
pub fn record_webhook_rejected() {
    metrics::counter!(WEBHOOKS_REJECTED).increment(1);
}

/// Record an undeliverable notification.
pub fn record_notification_failed(kind: &'static str) {
    metrics::counter!(NOTIFICATIONS_FAILED, "kind" => kind).increment(1);
}
