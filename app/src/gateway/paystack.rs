//! Paystack REST client.
//!
//! Every response arrives wrapped in `{ "status": bool, "message": str,
//! "data": ... }`. A non-2xx status or `status: false` becomes
//! [`GatewayError::Rejected`]; a timed-out call becomes
//! [`GatewayError::Timeout`]. Calls are never retried here: the client
//! re-verifies and the gateway redelivers webhooks on its own schedule.

use crate::config::GatewayConfig;
use chrono::{DateTime, Utc};
use marketplace_core::BoxFuture;
use marketplace_core::error::GatewayError;
use marketplace_core::gateway::{
    GatewayResult, GatewayStatus, InitializeRequest, InitializedTransaction, PaymentGateway,
    ResolvedAccount, SettlementReport, SubaccountRecord, SubaccountRequest, TransactionSnapshot,
};
use marketplace_core::types::{FeeBearer, Money, SettlementBatchStatus};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Longest gateway error body carried into an error message
const MAX_ERROR_BODY: usize = 512;

/// Paystack API client
#[derive(Clone)]
pub struct PaystackClient {
    client: Client,
    base_url: Url,
    secret_key: String,
}

impl std::fmt::Debug for PaystackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaystackClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl PaystackClient {
    /// Builds a client from gateway configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] if the base URL is invalid or the
    /// HTTP client cannot be built.
    pub fn new(config: &GatewayConfig) -> GatewayResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| GatewayError::Transport(format!("invalid base url '{}': {e}", config.base_url)))?;
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("marketplace/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            secret_key: config.secret_key.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> GatewayResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::Transport(format!("base url '{}' cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends the request and unwraps the envelope's `data`.
    async fn call(&self, request: RequestBuilder, operation: &'static str) -> GatewayResult<Value> {
        let response = request
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        let envelope: Envelope = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => {
                tracing::warn!(operation, error = %e, "Unparsable gateway response");
                return Err(GatewayError::InvalidResponse(e.to_string()));
            },
            Err(_) => {
                tracing::warn!(operation, status = status.as_u16(), "Gateway request failed");
                return Err(GatewayError::Rejected {
                    status: status.as_u16(),
                    message: truncate(&body),
                });
            },
        };

        if !status.is_success() || !envelope.status {
            tracing::warn!(
                operation,
                status = status.as_u16(),
                message = %envelope.message,
                "Gateway rejected request"
            );
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message: envelope.message,
            });
        }

        tracing::debug!(operation, "Gateway request succeeded");
        Ok(envelope.data)
    }

    async fn call_as<T: DeserializeOwned>(&self, request: RequestBuilder, operation: &'static str) -> GatewayResult<T> {
        let data = self.call(request, operation).await?;
        decode(data)
    }

    async fn settlement_references(&self, settlement_id: &str) -> GatewayResult<Vec<String>> {
        let url = self.endpoint(&["settlement", settlement_id, "transactions"])?;
        let transactions: Vec<SettlementTransaction> =
            self.call_as(self.client.get(url), "settlement_transactions").await?;
        Ok(transactions.into_iter().map(|t| t.reference).collect())
    }
}

fn transport_error(error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(error.to_string())
    }
}

fn decode<T: DeserializeOwned>(data: Value) -> GatewayResult<T> {
    serde_json::from_value(data).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY).collect()
}

fn parse_time(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct Envelope {
    status: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
    email: &'a str,
    amount: i64,
    currency: &'a str,
    reference: &'a str,
    metadata: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subaccount: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transaction_charge: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bearer: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    access_code: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    id: Option<i64>,
    status: String,
    reference: String,
    amount: i64,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    fees: Option<i64>,
    #[serde(default)]
    paid_at: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    gateway_response: Option<String>,
}

#[derive(Debug, Serialize)]
struct SubaccountBody<'a> {
    business_name: &'a str,
    settlement_bank: &'a str,
    account_number: &'a str,
    percentage_charge: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    primary_contact_email: Option<&'a str>,
}

impl<'a> From<&'a SubaccountRequest> for SubaccountBody<'a> {
    fn from(request: &'a SubaccountRequest) -> Self {
        Self {
            business_name: &request.business_name,
            settlement_bank: &request.bank_code,
            account_number: &request.account_number,
            percentage_charge: request.percentage_charge.as_percent(),
            primary_contact_email: request.email.as_deref(),
        }
    }
}

const fn active_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct SubaccountData {
    subaccount_code: String,
    business_name: String,
    #[serde(default)]
    settlement_bank: String,
    account_number: String,
    #[serde(default)]
    account_name: Option<String>,
    #[serde(default = "active_by_default")]
    active: bool,
}

impl From<SubaccountData> for SubaccountRecord {
    fn from(data: SubaccountData) -> Self {
        Self {
            subaccount_id: data.subaccount_code,
            business_name: data.business_name,
            settlement_bank: data.settlement_bank,
            account_number: data.account_number,
            account_name: data.account_name,
            active: data.active,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResolveData {
    account_number: String,
    account_name: String,
}

#[derive(Debug, Deserialize)]
struct SettlementSubaccount {
    subaccount_code: String,
}

#[derive(Debug, Deserialize)]
struct SettlementData {
    id: Value,
    status: String,
    #[serde(default)]
    currency: Option<String>,
    total_amount: i64,
    #[serde(default)]
    settlement_date: Option<String>,
    #[serde(default)]
    subaccount: Option<SettlementSubaccount>,
}

#[derive(Debug, Deserialize)]
struct SettlementTransaction {
    reference: String,
}

fn settlement_status(status: &str) -> SettlementBatchStatus {
    match status {
        "success" | "settled" => SettlementBatchStatus::Success,
        "failed" => SettlementBatchStatus::Failed,
        "cancelled" => SettlementBatchStatus::Cancelled,
        _ => SettlementBatchStatus::Pending,
    }
}

fn settlement_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// PaymentGateway
// ============================================================================

impl PaymentGateway for PaystackClient {
    fn initialize(&self, request: InitializeRequest) -> BoxFuture<'_, GatewayResult<InitializedTransaction>> {
        Box::pin(async move {
            let split = request.split.as_ref();
            let body = InitializeBody {
                email: &request.email,
                amount: request.amount.minor(),
                currency: &request.currency,
                reference: &request.reference,
                metadata: &request.metadata,
                callback_url: request.callback_url.as_deref(),
                subaccount: split.map(|s| s.subaccount_id.as_str()),
                transaction_charge: split.map(|s| s.transaction_charge.minor()),
                bearer: split.map(|s| match s.bearer {
                    FeeBearer::Vendor => "subaccount",
                    FeeBearer::Platform => "account",
                }),
            };
            let url = self.endpoint(&["transaction", "initialize"])?;
            let data: InitializeData = self
                .call_as(self.client.post(url).json(&body), "initialize")
                .await?;

            Ok(InitializedTransaction {
                authorization_url: data.authorization_url,
                access_code: data.access_code,
                reference: data.reference,
            })
        })
    }

    fn verify<'a>(&'a self, reference: &'a str) -> BoxFuture<'a, GatewayResult<TransactionSnapshot>> {
        Box::pin(async move {
            let url = self.endpoint(&["transaction", "verify", reference])?;
            let raw = self.call(self.client.get(url), "verify").await?;
            let data: VerifyData = decode(raw.clone())?;

            Ok(TransactionSnapshot {
                reference: data.reference,
                status: GatewayStatus::parse(&data.status),
                amount: Money::from_minor(data.amount),
                currency: data.currency.unwrap_or_default(),
                fees: Money::from_minor(data.fees.unwrap_or(0)),
                paid_at: parse_time(data.paid_at.as_deref()),
                channel: data.channel,
                gateway_id: data.id,
                gateway_response: data.gateway_response,
                raw,
            })
        })
    }

    fn create_subaccount(&self, request: SubaccountRequest) -> BoxFuture<'_, GatewayResult<SubaccountRecord>> {
        Box::pin(async move {
            let url = self.endpoint(&["subaccount"])?;
            let data: SubaccountData = self
                .call_as(
                    self.client.post(url).json(&SubaccountBody::from(&request)),
                    "create_subaccount",
                )
                .await?;
            Ok(data.into())
        })
    }

    fn update_subaccount<'a>(
        &'a self,
        subaccount_id: &'a str,
        request: SubaccountRequest,
    ) -> BoxFuture<'a, GatewayResult<SubaccountRecord>> {
        Box::pin(async move {
            let url = self.endpoint(&["subaccount", subaccount_id])?;
            let data: SubaccountData = self
                .call_as(
                    self.client.put(url).json(&SubaccountBody::from(&request)),
                    "update_subaccount",
                )
                .await?;
            Ok(data.into())
        })
    }

    fn fetch_subaccount<'a>(&'a self, subaccount_id: &'a str) -> BoxFuture<'a, GatewayResult<SubaccountRecord>> {
        Box::pin(async move {
            let url = self.endpoint(&["subaccount", subaccount_id])?;
            let data: SubaccountData = self.call_as(self.client.get(url), "fetch_subaccount").await?;
            Ok(data.into())
        })
    }

    fn resolve_account<'a>(
        &'a self,
        account_number: &'a str,
        bank_code: &'a str,
    ) -> BoxFuture<'a, GatewayResult<ResolvedAccount>> {
        Box::pin(async move {
            let url = self.endpoint(&["bank", "resolve"])?;
            let request = self
                .client
                .get(url)
                .query(&[("account_number", account_number), ("bank_code", bank_code)]);
            let data: ResolveData = self.call_as(request, "resolve_account").await?;
            Ok(ResolvedAccount {
                account_number: data.account_number,
                account_name: data.account_name,
            })
        })
    }

    fn list_settlements<'a>(
        &'a self,
        subaccount_id: Option<&'a str>,
    ) -> BoxFuture<'a, GatewayResult<Vec<SettlementReport>>> {
        Box::pin(async move {
            let url = self.endpoint(&["settlement"])?;
            let mut request = self.client.get(url);
            if let Some(subaccount) = subaccount_id {
                request = request.query(&[("subaccount", subaccount)]);
            }
            let batches: Vec<SettlementData> = self.call_as(request, "list_settlements").await?;

            let mut reports = Vec::with_capacity(batches.len());
            for batch in batches {
                let settlement_id = settlement_id(&batch.id);
                let payment_references = self.settlement_references(&settlement_id).await?;
                reports.push(SettlementReport {
                    settlement_id,
                    subaccount_id: batch
                        .subaccount
                        .map(|s| s.subaccount_code)
                        .or_else(|| subaccount_id.map(str::to_string)),
                    total_amount: Money::from_minor(batch.total_amount),
                    currency: batch.currency.unwrap_or_default(),
                    status: settlement_status(&batch.status),
                    settled_at: parse_time(batch.settlement_date.as_deref()),
                    payment_references,
                });
            }
            Ok(reports)
        })
    }
}
