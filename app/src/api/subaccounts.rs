//! Vendor sub-account endpoints.
//!
//! - GET /api/banks/resolve - Resolve an account holder name
//! - POST /api/subaccounts - Create the caller's sub-account
//! - PUT /api/subaccounts - Update bank details
//! - GET /api/subaccounts - Fetch and refresh the sub-account

use crate::auth::SessionUser;
use crate::server::state::AppState;
use crate::services::SubaccountInput;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use marketplace_core::vendor::Subaccount;
use marketplace_web::AppError;
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Account to resolve.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveAccountQuery {
    /// 10-digit account number
    pub account_number: String,
    /// Bank code
    pub bank_code: String,
}

/// Resolved holder name.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveAccountResponse {
    /// Name the bank holds for the account
    pub account_name: String,
}

/// Bank details for creating or updating a sub-account.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubaccountRequest {
    /// Business name shown on payouts
    pub business_name: String,
    /// Bank code
    pub bank_code: String,
    /// 10-digit account number
    pub account_number: String,
    /// Contact email
    pub email: Option<String>,
}

impl From<SubaccountRequest> for SubaccountInput {
    fn from(request: SubaccountRequest) -> Self {
        Self {
            business_name: request.business_name,
            bank_code: request.bank_code,
            account_number: request.account_number,
            email: request.email,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Resolve an account holder name.
///
/// # Errors
///
/// `VALIDATION_ERROR` for malformed or unknown accounts, `FORBIDDEN` for
/// non-vendors.
pub async fn resolve_account(
    session: SessionUser,
    State(state): State<AppState>,
    Query(query): Query<ResolveAccountQuery>,
) -> Result<Json<ResolveAccountResponse>, AppError> {
    let resolved = state
        .subaccounts
        .resolve_account(&session, &query.account_number, &query.bank_code)
        .await?;
    Ok(Json(ResolveAccountResponse {
        account_name: resolved.account_name,
    }))
}

/// Create the caller's sub-account.
///
/// # Errors
///
/// `ALREADY_EXISTS` when one is attached, validation and gateway errors.
pub async fn create_subaccount(
    session: SessionUser,
    State(state): State<AppState>,
    Json(request): Json<SubaccountRequest>,
) -> Result<(StatusCode, Json<Subaccount>), AppError> {
    let subaccount = state.subaccounts.create(&session, request.into()).await?;
    Ok((StatusCode::CREATED, Json(subaccount)))
}

/// Update the caller's bank details.
///
/// # Errors
///
/// `NOT_FOUND` when no sub-account is attached, validation and gateway
/// errors.
pub async fn update_subaccount(
    session: SessionUser,
    State(state): State<AppState>,
    Json(request): Json<SubaccountRequest>,
) -> Result<Json<Subaccount>, AppError> {
    Ok(Json(state.subaccounts.update(&session, request.into()).await?))
}

/// Fetch the caller's sub-account, refreshing its status from the gateway.
///
/// # Errors
///
/// `NOT_FOUND` when none is attached, `GATEWAY_ERROR`.
pub async fn get_subaccount(
    session: SessionUser,
    State(state): State<AppState>,
) -> Result<Json<Subaccount>, AppError> {
    Ok(Json(state.subaccounts.refresh(&session).await?))
}
