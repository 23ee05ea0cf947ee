//! Gateway webhook endpoint.
//!
//! - POST /api/webhooks/paystack
//!
//! The signature is checked over the raw body before anything is parsed or
//! read from the store. Once it is valid the gateway always gets `200`, so
//! it stops retrying; failures inside reconciliation are logged and left for
//! the next delivery or a client verify.

use crate::gateway::signature::{SIGNATURE_HEADER, verify};
use crate::metrics;
use crate::server::state::AppState;
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use marketplace_core::error::MarketplaceError;
use marketplace_web::{AppError, ClientIp, CorrelationId};
use serde::{Deserialize, Serialize};

/// Webhook envelope
#[derive(Debug, Deserialize)]
struct WebhookEvent {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Acknowledgement body
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    /// Always `true`
    pub received: bool,
}

const ACK: WebhookAck = WebhookAck { received: true };

/// Receive a gateway event.
///
/// # Errors
///
/// `INVALID_SIGNATURE` when the signature header is missing or wrong.
pub async fn paystack_webhook(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    CorrelationId(correlation_id): CorrelationId,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookAck>), AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !verify(&state.webhook_secret, &body, signature) {
        metrics::record_webhook_rejected();
        tracing::warn!(
            client_ip = %client_ip,
            correlation_id = %correlation_id,
            "Webhook signature rejected"
        );
        return Err(MarketplaceError::InvalidSignature.into());
    }

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(correlation_id = %correlation_id, error = %e, "Unreadable webhook body");
            return Ok((StatusCode::OK, Json(ACK)));
        },
    };

    match event.event.as_str() {
        "charge.success" | "charge.failed" => {
            let Some(reference) = event.data.get("reference").and_then(serde_json::Value::as_str) else {
                tracing::warn!(event = %event.event, correlation_id = %correlation_id, "Charge event without a reference");
                return Ok((StatusCode::OK, Json(ACK)));
            };
            match state.reconciler.reconcile(reference).await {
                Ok(report) => tracing::info!(
                    event = %event.event,
                    reference,
                    outcome = ?report.outcome,
                    "Webhook reconciled"
                ),
                Err(e) => tracing::error!(
                    event = %event.event,
                    reference,
                    error = %e,
                    "Webhook reconciliation failed, leaving payment for a retry"
                ),
            }
        },
        "transfer.success" | "transfer.failed" => {
            let transfer = event.data.get("reference").and_then(serde_json::Value::as_str);
            tracing::info!(event = %event.event, transfer = ?transfer, "Transfer event acknowledged");
        },
        other => tracing::debug!(event = other, "Ignoring webhook event"),
    }

    Ok((StatusCode::OK, Json(ACK)))
}
