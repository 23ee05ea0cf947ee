//! Booking API endpoints.
//!
//! - POST /api/bookings - Create a booking (explorer)
//! - GET /api/bookings - List bookings visible to the caller
//! - GET /api/bookings/:id - Get one booking
//! - GET /api/bookings/:id/history - Audited status overrides
//! - POST /api/bookings/:id/approve - Vendor approves an accommodation request
//! - POST /api/bookings/:id/reject - Vendor rejects an accommodation request
//! - POST /api/bookings/:id/status - Audited status override (vendor or admin)

use crate::auth::SessionUser;
use crate::server::state::AppState;
use crate::services::{BookingQuery, CouponInput, CreateBooking};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use marketplace_core::booking::{Booking, StatusChange};
use marketplace_core::types::{BookingId, BookingStatus, Category};
use marketplace_web::AppError;
use serde::Deserialize;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to create a booking.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    /// Vertical (`events`, `accommodations`, `leisure`, `movies_and_cinema`)
    #[serde(rename = "type")]
    pub booking_type: String,
    /// Listing being booked
    pub listing_id: String,
    /// Vertical-specific details
    #[serde(default)]
    pub details: serde_json::Value,
    /// Amount charged, in minor units
    pub total_amount: i64,
    /// Platform service fee, in minor units
    #[serde(default)]
    pub service_fee: i64,
    /// Optional coupon
    pub coupon: Option<CouponRequest>,
}

/// Coupon as submitted.
#[derive(Debug, Deserialize)]
pub struct CouponRequest {
    /// Coupon code
    pub code: Option<String>,
    /// Discount, in minor units
    #[serde(default)]
    pub discount: i64,
}

/// Query parameters for listing bookings.
#[derive(Debug, Deserialize)]
pub struct ListBookingsQuery {
    /// Status filter
    pub status: Option<BookingStatus>,
    /// Vertical filter
    #[serde(rename = "type")]
    pub category: Option<Category>,
    /// Page size
    pub limit: Option<u32>,
    /// Offset
    pub offset: Option<u32>,
}

/// Vendor decision on a request.
#[derive(Debug, Default, Deserialize)]
pub struct DecisionRequest {
    /// Message passed on to the explorer
    pub message: Option<String>,
}

/// Explicit status override.
#[derive(Debug, Deserialize)]
pub struct OverrideStatusRequest {
    /// Target status
    pub status: BookingStatus,
    /// Why the status is forced
    pub reason: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a booking.
///
/// # Errors
///
/// `INVALID_DETAILS`/`UNSUPPORTED_TYPE`/`VALIDATION_ERROR` for bad input,
/// `NOT_FOUND` for an unknown listing, `FORBIDDEN` for non-explorers.
pub async fn create_booking(
    session: SessionUser,
    State(state): State<AppState>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let input = CreateBooking {
        booking_type: request.booking_type,
        listing_id: request.listing_id,
        details: request.details,
        total_amount: request.total_amount,
        service_fee: request.service_fee,
        coupon: request.coupon.map(|c| CouponInput {
            code: c.code,
            discount: c.discount,
        }),
    };
    let booking = state.bookings.create(&session, input).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// List bookings visible to the caller.
///
/// # Errors
///
/// Store failures.
pub async fn list_bookings(
    session: SessionUser,
    State(state): State<AppState>,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = state
        .bookings
        .list(
            &session,
            BookingQuery {
                status: query.status,
                category: query.category,
                limit: query.limit,
                offset: query.offset,
            },
        )
        .await?;
    Ok(Json(bookings))
}

/// Get one booking.
///
/// # Errors
///
/// `NOT_FOUND`, or `FORBIDDEN` when the caller is not a party to it.
pub async fn get_booking(
    session: SessionUser,
    State(state): State<AppState>,
    Path(booking_id): Path<BookingId>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.get(&session, booking_id).await?))
}

/// Status overrides recorded for a booking.
///
/// # Errors
///
/// Same as [`get_booking`].
pub async fn booking_history(
    session: SessionUser,
    State(state): State<AppState>,
    Path(booking_id): Path<BookingId>,
) -> Result<Json<Vec<StatusChange>>, AppError> {
    Ok(Json(state.bookings.history(&session, booking_id).await?))
}

/// Approve an accommodation request.
///
/// # Errors
///
/// `FORBIDDEN` for anyone but the listing's vendor, `ALREADY_PROCESSED` when
/// already decided, `INVALID_STATUS` when not awaiting approval.
pub async fn approve_booking(
    session: SessionUser,
    State(state): State<AppState>,
    Path(booking_id): Path<BookingId>,
    body: Option<Json<DecisionRequest>>,
) -> Result<Json<Booking>, AppError> {
    let message = body.and_then(|Json(b)| b.message);
    Ok(Json(state.bookings.approve(&session, booking_id, message).await?))
}

/// Reject an accommodation request.
///
/// # Errors
///
/// Same as [`approve_booking`].
pub async fn reject_booking(
    session: SessionUser,
    State(state): State<AppState>,
    Path(booking_id): Path<BookingId>,
    body: Option<Json<DecisionRequest>>,
) -> Result<Json<Booking>, AppError> {
    let message = body.and_then(|Json(b)| b.message);
    Ok(Json(state.bookings.reject(&session, booking_id, message).await?))
}

/// Force a booking status, leaving an audit record.
///
/// # Errors
///
/// `FORBIDDEN` for explorers and other vendors, `VALIDATION_ERROR` without a
/// reason, `INVALID_STATUS` when the booking already has that status.
pub async fn override_status(
    session: SessionUser,
    State(state): State<AppState>,
    Path(booking_id): Path<BookingId>,
    Json(request): Json<OverrideStatusRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .bookings
        .override_status(&session, booking_id, request.status, request.reason)
        .await?;
    Ok(Json(booking))
}
