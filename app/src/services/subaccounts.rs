//! Vendor sub-account lifecycle at the gateway.
//!
//! A vendor holds at most one sub-account. Creation is claimed through a
//! reservation on the vendor profile before the gateway is called, so two
//! concurrent requests cannot both create one.

use super::Collaborators;
use crate::auth::SessionUser;
use marketplace_core::commission::CommissionResolver;
use marketplace_core::error::{GatewayError, MarketplaceError, Result, ValidationError};
use marketplace_core::gateway::{ResolvedAccount, SubaccountRecord, SubaccountRequest};
use marketplace_core::types::{Category, Percentage, Role, SubaccountStatus, UserId};
use marketplace_core::vendor::{BankDetails, Subaccount, VendorProfile};

/// Bank details submitted by a vendor
#[derive(Clone, Debug)]
pub struct SubaccountInput {
    /// Business name shown on settlements
    pub business_name: String,
    /// Bank code
    pub bank_code: String,
    /// Ten-digit account number
    pub account_number: String,
    /// Contact email; defaults to the session email
    pub email: Option<String>,
}

/// Sub-account operations
#[derive(Clone)]
pub struct SubaccountService {
    ports: Collaborators,
    resolver: CommissionResolver,
}

impl SubaccountService {
    /// Creates the service
    #[must_use]
    pub fn new(ports: Collaborators) -> Self {
        let resolver = CommissionResolver::new(ports.configurations.clone());
        Self { ports, resolver }
    }

    /// Looks up the account holder name.
    ///
    /// # Errors
    ///
    /// `VALIDATION_ERROR` for malformed or unresolvable accounts,
    /// `GATEWAY_ERROR` when the gateway is unreachable.
    pub async fn resolve_account(
        &self,
        session: &SessionUser,
        account_number: &str,
        bank_code: &str,
    ) -> Result<ResolvedAccount> {
        session.require(Role::Vendor)?;
        validate_account(account_number, bank_code)?;
        self.resolve(account_number, bank_code).await
    }

    /// Creates the caller's sub-account.
    ///
    /// # Errors
    ///
    /// `ALREADY_EXISTS` when the vendor has one (or a creation is in
    /// progress), `CONFIG_MISSING` without an active configuration,
    /// validation and gateway errors.
    #[tracing::instrument(skip_all, fields(vendor = %session.user_id))]
    pub async fn create(&self, session: &SessionUser, input: SubaccountInput) -> Result<Subaccount> {
        session.require(Role::Vendor)?;
        validate_input(&input)?;
        let resolved = self.resolve(&input.account_number, &input.bank_code).await?;

        if !self
            .ports
            .vendors
            .reserve_subaccount(session.user_id, session.vendor_preference)
            .await?
        {
            return Err(MarketplaceError::AlreadyExists("vendor already has a sub-account".to_string()));
        }

        match self.create_reserved(session, &input, resolved).await {
            Ok(subaccount) => {
                tracing::info!(subaccount_id = %subaccount.subaccount_id, "Sub-account created");
                Ok(subaccount)
            },
            Err(error) => {
                if let Err(release) = self.ports.vendors.release_subaccount(session.user_id).await {
                    tracing::error!(error = %release, "Failed to release sub-account reservation");
                }
                Err(error)
            },
        }
    }

    async fn create_reserved(
        &self,
        session: &SessionUser,
        input: &SubaccountInput,
        resolved: ResolvedAccount,
    ) -> Result<Subaccount> {
        let profile = self
            .ports
            .vendors
            .get_vendor(session.user_id)
            .await?
            .unwrap_or_else(|| VendorProfile::new(session.user_id, session.vendor_preference));
        let rate = self.rate_for(&profile).await?;

        let record = self
            .ports
            .gateway
            .create_subaccount(request(input, rate, session.email.clone()))
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Gateway refused sub-account creation");
                MarketplaceError::Gateway(e)
            })?;

        let now = self.ports.clock.now();
        let subaccount = from_record(record, input, Some(resolved.account_name), now, now);
        self.ports
            .vendors
            .save_subaccount(session.user_id, subaccount.clone())
            .await?;
        Ok(subaccount)
    }

    /// Replaces the bank details of the caller's sub-account.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` without a sub-account, validation and gateway errors.
    #[tracing::instrument(skip_all, fields(vendor = %session.user_id))]
    pub async fn update(&self, session: &SessionUser, input: SubaccountInput) -> Result<Subaccount> {
        session.require(Role::Vendor)?;
        validate_input(&input)?;
        let (profile, current) = self.current(session.user_id).await?;
        let resolved = self.resolve(&input.account_number, &input.bank_code).await?;
        let rate = self.rate_for(&profile).await?;

        let record = self
            .ports
            .gateway
            .update_subaccount(&current.subaccount_id, request(&input, rate, session.email.clone()))
            .await?;
        let subaccount = from_record(
            record,
            &input,
            Some(resolved.account_name),
            current.created_at,
            self.ports.clock.now(),
        );
        self.ports
            .vendors
            .save_subaccount(session.user_id, subaccount.clone())
            .await?;
        tracing::info!(subaccount_id = %subaccount.subaccount_id, "Sub-account updated");
        Ok(subaccount)
    }

    /// Refreshes the caller's sub-account from the gateway.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` without a sub-account, gateway errors.
    pub async fn refresh(&self, session: &SessionUser) -> Result<Subaccount> {
        session.require(Role::Vendor)?;
        let (_, mut subaccount) = self.current(session.user_id).await?;
        let record = self
            .ports
            .gateway
            .fetch_subaccount(&subaccount.subaccount_id)
            .await?;

        // Suspension is a local decision; the gateway cannot lift it
        subaccount.status = match (subaccount.status, record.active) {
            (SubaccountStatus::Suspended, _) => SubaccountStatus::Suspended,
            (_, true) => SubaccountStatus::Active,
            (_, false) => SubaccountStatus::Inactive,
        };
        subaccount.business_name = record.business_name;
        subaccount.settlement_bank = record.settlement_bank;
        if record.account_name.is_some() {
            subaccount.bank_details.account_name = record.account_name;
        }
        let now = self.ports.clock.now();
        subaccount.last_verified_at = Some(now);
        subaccount.updated_at = now;
        self.ports
            .vendors
            .save_subaccount(session.user_id, subaccount.clone())
            .await?;
        Ok(subaccount)
    }

    async fn current(&self, vendor: UserId) -> Result<(VendorProfile, Subaccount)> {
        let profile = self
            .ports
            .vendors
            .get_vendor(vendor)
            .await?
            .ok_or_else(|| MarketplaceError::not_found("sub-account", vendor))?;
        let subaccount = profile
            .subaccount
            .clone()
            .ok_or_else(|| MarketplaceError::not_found("sub-account", vendor))?;
        Ok((profile, subaccount))
    }

    /// Commission charged on the sub-account: the vendor's custom rate or
    /// the standard rate of their vertical.
    async fn rate_for(&self, profile: &VendorProfile) -> Result<Percentage> {
        let category = match (profile.commission_rate, profile.vendor_account_preference) {
            (_, Some(category)) => category,
            // Any vertical works: a custom rate overrides all of them.
            (Some(_), None) => Category::Events,
            (None, None) => {
                return Err(ValidationError::field(
                    "vendorAccountPreference",
                    "vendor has no primary vertical to take a commission rate from",
                )
                .into());
            },
        };
        Ok(self.resolver.resolve(profile.commission_rate, category).await?)
    }

    async fn resolve(&self, account_number: &str, bank_code: &str) -> Result<ResolvedAccount> {
        self.ports
            .gateway
            .resolve_account(account_number, bank_code)
            .await
            .map_err(|e| match e {
                GatewayError::Rejected { status, message } if (400..500).contains(&status) => {
                    MarketplaceError::Validation(ValidationError::field("accountNumber", message))
                },
                other => MarketplaceError::Gateway(other),
            })
    }
}

fn request(input: &SubaccountInput, rate: Percentage, session_email: Option<String>) -> SubaccountRequest {
    SubaccountRequest {
        business_name: input.business_name.trim().to_string(),
        bank_code: input.bank_code.trim().to_string(),
        account_number: input.account_number.trim().to_string(),
        percentage_charge: rate,
        email: input.email.clone().or(session_email),
    }
}

fn from_record(
    record: SubaccountRecord,
    input: &SubaccountInput,
    account_name: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    now: chrono::DateTime<chrono::Utc>,
) -> Subaccount {
    Subaccount {
        subaccount_id: record.subaccount_id,
        status: if record.active {
            SubaccountStatus::Active
        } else {
            SubaccountStatus::Inactive
        },
        business_name: record.business_name,
        settlement_bank: record.settlement_bank.clone(),
        bank_details: BankDetails {
            account_number: input.account_number.trim().to_string(),
            bank_code: input.bank_code.trim().to_string(),
            account_name: record.account_name.or(account_name),
            bank_name: Some(record.settlement_bank),
        },
        last_verified_at: Some(now),
        created_at,
        updated_at: now,
    }
}

fn validate_input(input: &SubaccountInput) -> std::result::Result<(), ValidationError> {
    if input.business_name.trim().is_empty() {
        return Err(ValidationError::field("businessName", "must not be empty"));
    }
    validate_account(&input.account_number, &input.bank_code)
}

/// Ten-digit NUBAN account number and a numeric bank code
fn validate_account(account_number: &str, bank_code: &str) -> std::result::Result<(), ValidationError> {
    let account_number = account_number.trim();
    if account_number.len() != 10 || !account_number.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::field("accountNumber", "must be exactly 10 digits"));
    }
    let bank_code = bank_code.trim();
    if bank_code.is_empty() || !bank_code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::field("bankCode", "must be a numeric bank code"));
    }
    Ok(())
}
