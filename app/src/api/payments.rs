//! Payment API endpoints.
//!
//! - POST /api/initialize-payment - Open a gateway transaction for a booking
//! - POST /api/verify-payment - Re-verify a reference with the gateway
//! - GET /api/payment-status - Status of one attempt
//! - GET /api/payments - Attempts visible to the caller

use crate::auth::SessionUser;
use crate::server::state::AppState;
use crate::services::{PaymentQuery, ReconcileOutcome};
use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, Utc};
use marketplace_core::gateway::InitializedTransaction;
use marketplace_core::payment::Payment;
use marketplace_core::types::{BookingId, Money, TransactionStatus};
use marketplace_web::AppError;
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to start paying for a booking.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializePaymentRequest {
    /// Booking to pay for
    pub booking_id: BookingId,
}

/// Request to verify a reference.
#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    /// Gateway reference
    pub reference: String,
}

/// Verification result: the gateway's payload plus what reconciliation did.
#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    /// Always `true` when the gateway answered
    pub status: bool,
    /// Human-readable summary
    pub message: String,
    /// Raw gateway verification payload
    pub data: serde_json::Value,
    /// Reconciliation outcome
    pub outcome: ReconcileOutcome,
}

/// Query for a single attempt.
#[derive(Debug, Deserialize)]
pub struct PaymentStatusQuery {
    /// Gateway reference
    pub reference: String,
}

/// Status of one attempt.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResponse {
    /// Attempt status
    pub status: TransactionStatus,
    /// Amount in minor units
    pub amount: Money,
    /// When the charge succeeded
    pub paid_at: Option<DateTime<Utc>>,
}

/// Query parameters for listing payments.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPaymentsQuery {
    /// Booking filter
    pub booking_id: Option<BookingId>,
    /// Status filter
    pub status: Option<TransactionStatus>,
    /// Page size
    pub limit: Option<u32>,
    /// Offset
    pub offset: Option<u32>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Open a gateway transaction for a pending booking.
///
/// # Errors
///
/// `INVALID_STATUS` unless the booking is pending, `ALREADY_PROCESSED` when
/// it is paid, `CONFIG_MISSING`, `GATEWAY_ERROR` when the gateway refuses.
pub async fn initialize_payment(
    session: SessionUser,
    State(state): State<AppState>,
    Json(request): Json<InitializePaymentRequest>,
) -> Result<Json<InitializedTransaction>, AppError> {
    Ok(Json(state.checkout.initialize(&session, request.booking_id).await?))
}

/// Re-verify a reference and apply whatever the gateway reports.
///
/// # Errors
///
/// `NOT_FOUND`/`FORBIDDEN` for references the caller cannot see,
/// `GATEWAY_ERROR` when verification fails (the payment stays pending).
pub async fn verify_payment(
    session: SessionUser,
    State(state): State<AppState>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>, AppError> {
    state.checkout.payment(&session, &request.reference).await?;
    let report = state.reconciler.reconcile(&request.reference).await?;

    let message = match &report.outcome {
        ReconcileOutcome::Confirmed | ReconcileOutcome::AlreadyConfirmed => "Payment verified",
        ReconcileOutcome::InFlight { .. } => "Payment is still processing",
        ReconcileOutcome::DuplicateCharge { .. } => "Booking was already paid, this charge will be refunded",
        _ => "Payment not successful",
    };
    Ok(Json(VerifyPaymentResponse {
        status: true,
        message: message.to_string(),
        data: report.snapshot.map_or(serde_json::Value::Null, |s| s.raw),
        outcome: report.outcome,
    }))
}

/// Status of one attempt.
///
/// # Errors
///
/// `NOT_FOUND`/`FORBIDDEN` for references the caller cannot see.
pub async fn payment_status(
    session: SessionUser,
    State(state): State<AppState>,
    Query(query): Query<PaymentStatusQuery>,
) -> Result<Json<PaymentStatusResponse>, AppError> {
    let payment = state.checkout.payment(&session, &query.reference).await?;
    Ok(Json(PaymentStatusResponse {
        status: payment.status,
        amount: payment.amount,
        paid_at: payment.paid_at,
    }))
}

/// Attempts visible to the caller.
///
/// # Errors
///
/// Store failures.
pub async fn list_payments(
    session: SessionUser,
    State(state): State<AppState>,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let payments = state
        .checkout
        .list(
            &session,
            PaymentQuery {
                booking_id: query.booking_id,
                status: query.status,
                limit: query.limit,
                offset: query.offset,
            },
        )
        .await?;
    Ok(Json(payments))
}
