//! Admin endpoints.
//!
//! - GET /api/admin/configuration - Active commission configuration
//! - PUT /api/admin/configuration - Activate new standard rates
//! - PUT /api/admin/vendors/:id/commission - Set or clear a vendor's rate
//! - POST /api/admin/settlements - Ingest a settlement report
//! - POST /api/admin/settlements/sync - Pull settlements from the gateway

use crate::auth::SessionUser;
use crate::server::state::AppState;
use crate::services::{RatesInput, SyncSummary};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use marketplace_core::commission::{CommissionRates, Configuration};
use marketplace_core::gateway::SettlementReport;
use marketplace_core::types::{ConfigurationId, Money, Percentage, SettlementBatchStatus, UserId};
use marketplace_web::AppError;
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Per-vertical rates in percent (`7.5` is 7.5%).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatesBody {
    /// Events
    pub events: f64,
    /// Accommodations
    pub accommodations: f64,
    /// Leisure
    pub leisure: f64,
    /// Movies and cinema
    pub movies_and_cinema: f64,
}

impl From<CommissionRates> for RatesBody {
    fn from(rates: CommissionRates) -> Self {
        Self {
            events: rates.events.as_percent(),
            accommodations: rates.accommodations.as_percent(),
            leisure: rates.leisure.as_percent(),
            movies_and_cinema: rates.movies_and_cinema.as_percent(),
        }
    }
}

/// Request to replace the standard rates.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConfigurationRequest {
    /// New rates
    pub commission_rates: RatesBody,
}

/// Commission configuration with rates in percent.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationResponse {
    /// Configuration id
    pub id: ConfigurationId,
    /// Version, incremented on every change
    pub version: i64,
    /// Rates in percent
    pub commission_rates: RatesBody,
    /// Whether this is the active version
    pub is_active: bool,
    /// Admin who activated it
    pub updated_by: Option<UserId>,
    /// Activation time
    pub updated_at: DateTime<Utc>,
}

impl From<Configuration> for ConfigurationResponse {
    fn from(configuration: Configuration) -> Self {
        Self {
            id: configuration.id,
            version: configuration.version,
            commission_rates: configuration.commission_rates.into(),
            is_active: configuration.is_active,
            updated_by: configuration.updated_by,
            updated_at: configuration.updated_at,
        }
    }
}

/// Request to set (or clear, with `null`) a vendor's custom rate.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorCommissionRequest {
    /// Rate in percent
    pub commission_rate: Option<f64>,
}

/// Result of a vendor rate change.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorCommissionResponse {
    /// Vendor
    pub vendor_id: UserId,
    /// Custom rate in percent
    pub commission_rate: Option<f64>,
    /// Rate now applied to the vendor's payments, in percent
    pub effective_rate: Option<f64>,
    /// Whether the gateway sub-account was re-synced
    pub subaccount_synced: bool,
}

/// Settlement report pushed by an admin.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReportRequest {
    /// Gateway settlement id
    pub settlement_id: String,
    /// Sub-account paid out
    pub subaccount_id: Option<String>,
    /// Total paid out, in minor units
    pub total_amount: i64,
    /// ISO currency
    pub currency: String,
    /// Batch status
    pub status: SettlementBatchStatus,
    /// Payout time
    pub settled_at: Option<DateTime<Utc>>,
    /// Gateway references of the contributing payments
    #[serde(default)]
    pub payment_references: Vec<String>,
}

/// Result of a settlement ingest.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    /// Whether the batch was new
    pub created: bool,
    /// Payments whose settlement status changed
    pub payments_updated: u64,
}

// ============================================================================
// Handlers
// ============================================================================

/// Active commission configuration.
///
/// # Errors
///
/// `FORBIDDEN` for non-admins, `CONFIG_MISSING`.
pub async fn get_configuration(
    session: SessionUser,
    State(state): State<AppState>,
) -> Result<Json<ConfigurationResponse>, AppError> {
    Ok(Json(state.commission.configuration(&session).await?.into()))
}

/// Activate new standard rates.
///
/// # Errors
///
/// `FORBIDDEN` for non-admins, `VALIDATION_ERROR` for rates outside 0-100.
pub async fn update_configuration(
    session: SessionUser,
    State(state): State<AppState>,
    Json(request): Json<UpdateConfigurationRequest>,
) -> Result<Json<ConfigurationResponse>, AppError> {
    let rates = request.commission_rates;
    let input = RatesInput {
        events: rates.events,
        accommodations: rates.accommodations,
        leisure: rates.leisure,
        movies_and_cinema: rates.movies_and_cinema,
    };
    Ok(Json(state.commission.replace_rates(&session, input).await?.into()))
}

/// Set or clear a vendor's custom rate.
///
/// # Errors
///
/// `FORBIDDEN` for non-admins, `VALIDATION_ERROR`, `GATEWAY_ERROR` when the
/// sub-account could not be re-synced.
pub async fn set_vendor_commission(
    session: SessionUser,
    State(state): State<AppState>,
    Path(vendor_id): Path<UserId>,
    Json(request): Json<VendorCommissionRequest>,
) -> Result<Json<VendorCommissionResponse>, AppError> {
    let change = state
        .commission
        .set_vendor_rate(&session, vendor_id, request.commission_rate)
        .await?;
    Ok(Json(VendorCommissionResponse {
        vendor_id: change.profile.id,
        commission_rate: change.profile.commission_rate.map(Percentage::as_percent),
        effective_rate: change.effective_rate.map(Percentage::as_percent),
        subaccount_synced: change.subaccount_synced,
    }))
}

/// Ingest a settlement report.
///
/// # Errors
///
/// `FORBIDDEN` for non-admins, `VALIDATION_ERROR` for a negative total.
pub async fn ingest_settlement(
    session: SessionUser,
    State(state): State<AppState>,
    Json(request): Json<SettlementReportRequest>,
) -> Result<(StatusCode, Json<IngestResponse>), AppError> {
    if request.total_amount < 0 {
        return Err(AppError::validation("totalAmount must not be negative"));
    }
    let report = SettlementReport {
        settlement_id: request.settlement_id,
        subaccount_id: request.subaccount_id,
        total_amount: Money::from_minor(request.total_amount),
        currency: request.currency,
        status: request.status,
        settled_at: request.settled_at,
        payment_references: request.payment_references,
    };
    let upsert = state.settlements.ingest(&session, report).await?;
    let status = if upsert.created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((
        status,
        Json(IngestResponse {
            created: upsert.created,
            payments_updated: upsert.payments_updated,
        }),
    ))
}

/// Pull settlements from the gateway for every vendor with a sub-account.
///
/// # Errors
///
/// `FORBIDDEN` for non-admins, store failures.
pub async fn sync_settlements(
    session: SessionUser,
    State(state): State<AppState>,
) -> Result<Json<SyncSummary>, AppError> {
    Ok(Json(state.settlements.sync(&session).await?))
}
