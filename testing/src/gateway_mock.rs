//! Scripted payment gateway.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use marketplace_core::BoxFuture;
use marketplace_core::error::GatewayError;
use marketplace_core::gateway::{
    GatewayResult, GatewayStatus, InitializeRequest, InitializedTransaction, PaymentGateway,
    ResolvedAccount, SettlementReport, SubaccountRecord, SubaccountRequest, TransactionSnapshot,
};
use marketplace_core::types::Money;
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Script {
    verifications: HashMap<String, GatewayResult<TransactionSnapshot>>,
    initialize_error: Option<GatewayError>,
    subaccount_error: Option<GatewayError>,
    accounts: HashMap<(String, String), String>,
    settlements: Vec<SettlementReport>,

    initialize_requests: Vec<InitializeRequest>,
    verify_calls: usize,
    created_subaccounts: Vec<SubaccountRequest>,
    updated_subaccounts: Vec<(String, SubaccountRequest)>,
}

/// Payment gateway double that replays scripted answers and records calls.
///
/// Unscripted verifications fail the way the real gateway does for an
/// unknown reference.
#[derive(Clone, Debug, Default)]
pub struct MockGateway {
    script: Arc<Mutex<Script>>,
}

impl MockGateway {
    /// Create a gateway with nothing scripted
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer verifications of `snapshot.reference` with `snapshot`
    pub fn script_verify(&self, snapshot: TransactionSnapshot) {
        self.script
            .lock()
            .unwrap()
            .verifications
            .insert(snapshot.reference.clone(), Ok(snapshot));
    }

    /// Fail verifications of `reference` with `error`
    pub fn script_verify_error(&self, reference: &str, error: GatewayError) {
        self.script
            .lock()
            .unwrap()
            .verifications
            .insert(reference.to_string(), Err(error));
    }

    /// Fail the next initializations with `error`
    pub fn fail_initialize(&self, error: GatewayError) {
        self.script.lock().unwrap().initialize_error = Some(error);
    }

    /// Fail sub-account creation and updates with `error`
    pub fn fail_subaccounts(&self, error: GatewayError) {
        self.script.lock().unwrap().subaccount_error = Some(error);
    }

    /// Register a resolvable bank account
    pub fn add_account(&self, account_number: &str, bank_code: &str, account_name: &str) {
        self.script.lock().unwrap().accounts.insert(
            (account_number.to_string(), bank_code.to_string()),
            account_name.to_string(),
        );
    }

    /// Add a settlement batch to the listing
    pub fn add_settlement(&self, report: SettlementReport) {
        self.script.lock().unwrap().settlements.push(report);
    }

    /// Initialization requests received so far
    #[must_use]
    pub fn initialize_requests(&self) -> Vec<InitializeRequest> {
        self.script.lock().unwrap().initialize_requests.clone()
    }

    /// Number of verification calls received so far
    #[must_use]
    pub fn verify_calls(&self) -> usize {
        self.script.lock().unwrap().verify_calls
    }

    /// Sub-account creation requests received so far
    #[must_use]
    pub fn created_subaccounts(&self) -> Vec<SubaccountRequest> {
        self.script.lock().unwrap().created_subaccounts.clone()
    }

    /// Sub-account update requests received so far
    #[must_use]
    pub fn updated_subaccounts(&self) -> Vec<(String, SubaccountRequest)> {
        self.script.lock().unwrap().updated_subaccounts.clone()
    }

    fn record(request: &SubaccountRequest, subaccount_id: String) -> SubaccountRecord {
        SubaccountRecord {
            subaccount_id,
            business_name: request.business_name.clone(),
            settlement_bank: "Test Bank".into(),
            account_number: request.account_number.clone(),
            account_name: None,
            active: true,
        }
    }
}

/// A successful verification snapshot
#[must_use]
pub fn successful_charge(reference: &str, amount: Money, fees: Money) -> TransactionSnapshot {
    TransactionSnapshot {
        reference: reference.to_string(),
        status: GatewayStatus::Success,
        amount,
        currency: "NGN".into(),
        fees,
        paid_at: Some(Utc::now()),
        channel: Some("card".into()),
        gateway_id: Some(4_099_260_516),
        gateway_response: Some("Approved".into()),
        raw: json!({
            "reference": reference,
            "status": "success",
            "amount": amount.minor(),
            "fees": fees.minor(),
        }),
    }
}

/// A non-success verification snapshot (`failed`, `abandoned`, `ongoing`, ...)
#[must_use]
pub fn unsuccessful_charge(reference: &str, amount: Money, status: &str) -> TransactionSnapshot {
    TransactionSnapshot {
        reference: reference.to_string(),
        status: GatewayStatus::parse(status),
        amount,
        currency: "NGN".into(),
        fees: Money::ZERO,
        paid_at: None,
        channel: None,
        gateway_id: None,
        gateway_response: Some(format!("Transaction {status}")),
        raw: json!({ "reference": reference, "status": status }),
    }
}

impl PaymentGateway for MockGateway {
    fn initialize(&self, request: InitializeRequest) -> BoxFuture<'_, GatewayResult<InitializedTransaction>> {
        Box::pin(async move {
            let mut script = self.script.lock().unwrap();
            if let Some(error) = script.initialize_error.clone() {
                return Err(error);
            }
            let reference = request.reference.clone();
            script.initialize_requests.push(request);
            Ok(InitializedTransaction {
                authorization_url: format!("https://checkout.test/{reference}"),
                access_code: format!("access-{reference}"),
                reference,
            })
        })
    }

    fn verify<'a>(&'a self, reference: &'a str) -> BoxFuture<'a, GatewayResult<TransactionSnapshot>> {
        Box::pin(async move {
            // Let concurrent confirmations interleave.
            tokio::task::yield_now().await;
            let mut script = self.script.lock().unwrap();
            script.verify_calls += 1;
            script
                .verifications
                .get(reference)
                .cloned()
                .unwrap_or_else(|| {
                    Err(GatewayError::Rejected {
                        status: 400,
                        message: "Transaction reference not found".into(),
                    })
                })
        })
    }

    fn create_subaccount(&self, request: SubaccountRequest) -> BoxFuture<'_, GatewayResult<SubaccountRecord>> {
        Box::pin(async move {
            let mut script = self.script.lock().unwrap();
            if let Some(error) = script.subaccount_error.clone() {
                return Err(error);
            }
            script.created_subaccounts.push(request.clone());
            let code = format!("ACCT_{:04}", script.created_subaccounts.len());
            Ok(Self::record(&request, code))
        })
    }

    fn update_subaccount<'a>(
        &'a self,
        subaccount_id: &'a str,
        request: SubaccountRequest,
    ) -> BoxFuture<'a, GatewayResult<SubaccountRecord>> {
        Box::pin(async move {
            let mut script = self.script.lock().unwrap();
            if let Some(error) = script.subaccount_error.clone() {
                return Err(error);
            }
            script
                .updated_subaccounts
                .push((subaccount_id.to_string(), request.clone()));
            Ok(Self::record(&request, subaccount_id.to_string()))
        })
    }

    fn fetch_subaccount<'a>(&'a self, subaccount_id: &'a str) -> BoxFuture<'a, GatewayResult<SubaccountRecord>> {
        Box::pin(async move {
            let script = self.script.lock().unwrap();
            let request = script
                .created_subaccounts
                .iter()
                .enumerate()
                .find(|(i, _)| format!("ACCT_{:04}", i + 1) == subaccount_id)
                .map(|(_, r)| r.clone());
            request
                .map(|r| Self::record(&r, subaccount_id.to_string()))
                .ok_or_else(|| GatewayError::Rejected {
                    status: 404,
                    message: "Subaccount not found".into(),
                })
        })
    }

    fn resolve_account<'a>(
        &'a self,
        account_number: &'a str,
        bank_code: &'a str,
    ) -> BoxFuture<'a, GatewayResult<ResolvedAccount>> {
        Box::pin(async move {
            let script = self.script.lock().unwrap();
            script
                .accounts
                .get(&(account_number.to_string(), bank_code.to_string()))
                .map(|name| ResolvedAccount {
                    account_number: account_number.to_string(),
                    account_name: name.clone(),
                })
                .ok_or_else(|| GatewayError::Rejected {
                    status: 422,
                    message: "Could not resolve account name".into(),
                })
        })
    }

    fn list_settlements<'a>(
        &'a self,
        subaccount_id: Option<&'a str>,
    ) -> BoxFuture<'a, GatewayResult<Vec<SettlementReport>>> {
        Box::pin(async move {
            let script = self.script.lock().unwrap();
            Ok(script
                .settlements
                .iter()
                .filter(|s| subaccount_id.is_none_or(|id| s.subaccount_id.as_deref() == Some(id)))
                .cloned()
                .collect())
        })
    }
}
