//! Settlement read endpoints.
//!
//! - GET /api/settlements - Batches visible to the caller
//! - GET /api/settlements/summary - Settled, pending and failed totals

use crate::auth::SessionUser;
use crate::server::state::AppState;
use axum::{Json, extract::State};
use marketplace_core::settlement::{Settlement, SettlementSummary};
use marketplace_web::AppError;

/// Batches for the calling vendor, or all batches for admins.
///
/// # Errors
///
/// `FORBIDDEN` for explorers.
pub async fn list_settlements(
    session: SessionUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Settlement>>, AppError> {
    Ok(Json(state.settlements.list(&session).await?))
}

/// Aggregate totals for the calling vendor, or platform-wide for admins.
///
/// # Errors
///
/// `FORBIDDEN` for explorers.
pub async fn settlement_summary(
    session: SessionUser,
    State(state): State<AppState>,
) -> Result<Json<SettlementSummary>, AppError> {
    Ok(Json(state.settlements.summary(&session).await?))
}
