//! Commission administration.

use super::Collaborators;
use crate::auth::SessionUser;
use marketplace_core::commission::{CommissionRates, CommissionResolver, Configuration};
use marketplace_core::error::{MarketplaceError, Result, ValidationError};
use marketplace_core::gateway::SubaccountRequest;
use marketplace_core::types::{Percentage, Role, UserId};
use marketplace_core::vendor::VendorProfile;

/// Rates as submitted, in percent (`7.5` is 7.5%)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RatesInput {
    /// Events
    pub events: f64,
    /// Accommodations
    pub accommodations: f64,
    /// Leisure
    pub leisure: f64,
    /// Movies and cinema
    pub movies_and_cinema: f64,
}

impl RatesInput {
    fn to_rates(self) -> std::result::Result<CommissionRates, ValidationError> {
        let rate = |field: &'static str, percent: f64| {
            Percentage::from_percent(percent).map_err(|_| ValidationError::field(field, "must be between 0 and 100"))
        };
        Ok(CommissionRates {
            events: rate("events", self.events)?,
            accommodations: rate("accommodations", self.accommodations)?,
            leisure: rate("leisure", self.leisure)?,
            movies_and_cinema: rate("movies_and_cinema", self.movies_and_cinema)?,
        })
    }
}

/// Result of a vendor rate change
#[derive(Clone, Debug)]
pub struct VendorRateChange {
    /// Updated profile
    pub profile: VendorProfile,
    /// Rate now charged on the vendor's payments
    pub effective_rate: Option<Percentage>,
    /// Whether the gateway sub-account was updated to match
    pub subaccount_synced: bool,
}

/// Admin operations on commission rates
#[derive(Clone)]
pub struct CommissionAdmin {
    ports: Collaborators,
    resolver: CommissionResolver,
}

impl CommissionAdmin {
    /// Creates the service
    #[must_use]
    pub fn new(ports: Collaborators) -> Self {
        let resolver = CommissionResolver::new(ports.configurations.clone());
        Self { ports, resolver }
    }

    /// The active configuration.
    ///
    /// # Errors
    ///
    /// `FORBIDDEN` for non-admins, `CONFIG_MISSING` when none is active.
    pub async fn configuration(&self, session: &SessionUser) -> Result<Configuration> {
        session.require(Role::Admin)?;
        self.ports
            .configurations
            .active_configuration()
            .await?
            .ok_or(MarketplaceError::ConfigMissing)
    }

    /// Activates a new configuration version. Payments already opened keep
    /// the rate they were opened with.
    ///
    /// # Errors
    ///
    /// `FORBIDDEN` for non-admins, `VALIDATION_ERROR` for out-of-range rates.
    pub async fn replace_rates(&self, session: &SessionUser, input: RatesInput) -> Result<Configuration> {
        session.require(Role::Admin)?;
        let rates = input.to_rates()?;
        let configuration = self
            .ports
            .configurations
            .activate_configuration(rates, session.user_id, self.ports.clock.now())
            .await?;
        tracing::info!(
            version = configuration.version,
            actor = %session.user_id,
            events = %rates.events,
            accommodations = %rates.accommodations,
            leisure = %rates.leisure,
            movies_and_cinema = %rates.movies_and_cinema,
            "Commission configuration activated"
        );
        Ok(configuration)
    }

    /// Sets or clears a vendor's custom rate and re-syncs the percentage on
    /// the vendor's active sub-account.
    ///
    /// # Errors
    ///
    /// `FORBIDDEN` for non-admins, `VALIDATION_ERROR` for out-of-range rates,
    /// `GATEWAY_ERROR` when the sub-account could not be updated (the stored
    /// rate has already changed; retrying re-syncs).
    pub async fn set_vendor_rate(
        &self,
        session: &SessionUser,
        vendor: UserId,
        percent: Option<f64>,
    ) -> Result<VendorRateChange> {
        session.require(Role::Admin)?;
        let rate = percent
            .map(|p| {
                Percentage::from_percent(p).map_err(|_| ValidationError::field("commissionRate", "must be between 0 and 100"))
            })
            .transpose()?;
        let profile = self.ports.vendors.set_commission_rate(vendor, rate).await?;
        tracing::info!(vendor = %vendor, rate = ?rate.map(Percentage::as_percent), actor = %session.user_id, "Vendor commission changed");

        let category = profile.vendor_account_preference;
        let effective_rate = match category {
            Some(category) => Some(self.resolver.resolve(profile.commission_rate, category).await?),
            None => profile.commission_rate,
        };

        let mut subaccount_synced = false;
        if let Some(subaccount) = profile.active_subaccount() {
            let Some(percentage_charge) = effective_rate else {
                tracing::warn!(vendor = %vendor, "No vertical to resolve a standard rate from, sub-account not re-synced");
                return Ok(VendorRateChange {
                    profile,
                    effective_rate,
                    subaccount_synced,
                });
            };
            let request = SubaccountRequest {
                business_name: subaccount.business_name.clone(),
                bank_code: subaccount.bank_details.bank_code.clone(),
                account_number: subaccount.bank_details.account_number.clone(),
                percentage_charge,
                email: None,
            };
            self.ports
                .gateway
                .update_subaccount(&subaccount.subaccount_id, request)
                .await
                .map_err(|e| {
                    tracing::warn!(vendor = %vendor, error = %e, "Sub-account commission re-sync failed");
                    MarketplaceError::Gateway(e)
                })?;
            subaccount_synced = true;
        }

        Ok(VendorRateChange {
            profile,
            effective_rate,
            subaccount_synced,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::services::fixtures::{World, session};
    use marketplace_core::types::Category;
    use marketplace_testing::active_subaccount;

    fn input() -> RatesInput {
        RatesInput {
            events: 10.0,
            accommodations: 12.5,
            leisure: 5.0,
            movies_and_cinema: 8.0,
        }
    }

    #[tokio::test]
    async fn replacing_rates_creates_a_new_version() {
        let world = World::configured();
        let admin = CommissionAdmin::new(world.collaborators.clone());
        let before = admin.configuration(&session(Role::Admin)).await.unwrap();

        let after = admin.replace_rates(&session(Role::Admin), input()).await.unwrap();

        assert!(after.version > before.version);
        assert!(after.is_active);
        assert_eq!(after.commission_rates.accommodations, Percentage::from_bps(1_250).unwrap());
        assert_eq!(world.store.configuration_versions(), 2);
        assert_eq!(admin.configuration(&session(Role::Admin)).await.unwrap().id, after.id);
    }

    #[tokio::test]
    async fn only_admins_manage_rates() {
        let world = World::configured();
        let admin = CommissionAdmin::new(world.collaborators.clone());

        let error = admin.replace_rates(&session(Role::Vendor), input()).await.unwrap_err();
        assert_eq!(error.code(), "FORBIDDEN");

        let out_of_range = RatesInput {
            events: 120.0,
            ..input()
        };
        let error = admin
            .replace_rates(&session(Role::Admin), out_of_range)
            .await
            .unwrap_err();
        assert_eq!(error.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn missing_configuration_is_reported() {
        let world = World::new();
        let admin = CommissionAdmin::new(world.collaborators.clone());

        let error = admin.configuration(&session(Role::Admin)).await.unwrap_err();

        assert_eq!(error.code(), "CONFIG_MISSING");
    }

    #[tokio::test]
    async fn vendor_rate_resyncs_the_subaccount() {
        let world = World::configured();
        let vendor = UserId::new();
        let mut profile = VendorProfile::new(vendor, Some(Category::Leisure));
        profile.subaccount = Some(active_subaccount("ACCT_0042"));
        world.store.put_vendor(profile);
        let admin = CommissionAdmin::new(world.collaborators.clone());

        let change = admin
            .set_vendor_rate(&session(Role::Admin), vendor, Some(7.5))
            .await
            .unwrap();

        assert!(change.subaccount_synced);
        assert_eq!(change.effective_rate, Some(Percentage::from_bps(750).unwrap()));
        let updates = world.gateway.updated_subaccounts();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, "ACCT_0042");
        assert_eq!(updates[0].1.percentage_charge, Percentage::from_bps(750).unwrap());

        let cleared = admin
            .set_vendor_rate(&session(Role::Admin), vendor, None)
            .await
            .unwrap();
        assert_eq!(cleared.profile.commission_rate, None);
        assert_eq!(cleared.effective_rate, Some(Percentage::from_bps(500).unwrap()));
    }

    #[tokio::test]
    async fn vendor_without_subaccount_is_not_synced() {
        let world = World::configured();
        let admin = CommissionAdmin::new(world.collaborators.clone());

        let change = admin
            .set_vendor_rate(&session(Role::Admin), UserId::new(), Some(3.0))
            .await
            .unwrap();

        assert!(!change.subaccount_synced);
        assert!(world.gateway.updated_subaccounts().is_empty());
        assert_eq!(change.profile.commission_rate, Some(Percentage::from_bps(300).unwrap()));
    }
}
