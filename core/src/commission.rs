//! Commission configuration, rate resolution and amount splitting.

use crate::error::CommissionError;
use crate::store::ConfigurationStore;
use crate::types::{Category, ConfigurationId, FeeBearer, Money, Percentage, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Standard commission per vertical
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionRates {
    /// Events
    pub events: Percentage,
    /// Accommodations
    pub accommodations: Percentage,
    /// Leisure
    pub leisure: Percentage,
    /// Movies and cinema
    pub movies_and_cinema: Percentage,
}

impl CommissionRates {
    /// Standard rate for `category`
    #[must_use]
    pub const fn get(&self, category: Category) -> Percentage {
        match category {
            Category::Events => self.events,
            Category::Accommodations => self.accommodations,
            Category::Leisure => self.leisure,
            Category::MoviesAndCinema => self.movies_and_cinema,
        }
    }
}

/// One version of the platform configuration. At most one is active.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Row identifier
    pub id: ConfigurationId,
    /// Monotonic version number
    pub version: i64,
    /// Standard rates
    pub commission_rates: CommissionRates,
    /// Whether this version is in force
    pub is_active: bool,
    /// Admin who activated it
    pub updated_by: Option<UserId>,
    /// Activation time
    pub updated_at: DateTime<Utc>,
}

/// Effective rate: the vendor's custom rate when present, else the standard
/// rate for `category`.
#[must_use]
pub fn effective_rate(
    configuration: &Configuration,
    vendor_rate: Option<Percentage>,
    category: Category,
) -> Percentage {
    vendor_rate.unwrap_or_else(|| configuration.commission_rates.get(category))
}

/// Loads the active configuration and resolves effective rates.
///
/// Read-only; repeated calls against one configuration version agree.
#[derive(Clone)]
pub struct CommissionResolver {
    configurations: Arc<dyn ConfigurationStore>,
}

impl CommissionResolver {
    /// Creates a resolver over the given configuration store
    #[must_use]
    pub fn new(configurations: Arc<dyn ConfigurationStore>) -> Self {
        Self { configurations }
    }

    /// Resolves the rate for a vendor and category.
    ///
    /// # Errors
    ///
    /// Returns [`CommissionError::ConfigMissing`] when no configuration is
    /// active, even if the vendor carries a custom rate.
    pub async fn resolve(
        &self,
        vendor_rate: Option<Percentage>,
        category: Category,
    ) -> Result<Percentage, CommissionError> {
        let configuration = self
            .configurations
            .active_configuration()
            .await?
            .ok_or(CommissionError::ConfigMissing)?;
        Ok(effective_rate(&configuration, vendor_rate, category))
    }
}

/// Shares of a successful payment
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Split {
    /// Paid out to the vendor
    pub vendor_amount: Money,
    /// Kept by the platform, net of fees it bears
    pub platform_amount: Money,
    /// Charged by the gateway
    pub gateway_fees: Money,
}

/// Splits `amount` between vendor and platform.
///
/// `commission` is the platform's gross share; the vendor share is recorded
/// before fee attribution. Fees the platform bears are deducted from its
/// share. Non-split payments land in the platform account, so the platform
/// always bears their fees.
#[must_use]
pub fn split_amounts(
    amount: Money,
    commission: Money,
    fees: Money,
    bearer: FeeBearer,
    is_split: bool,
) -> Split {
    let platform_fees = if platform_bears_fees(bearer, is_split) {
        fees
    } else {
        Money::ZERO
    };
    Split {
        vendor_amount: amount - commission,
        platform_amount: commission - platform_fees,
        gateway_fees: fees,
    }
}

/// Whether gateway fees come out of the platform's share
#[must_use]
pub fn platform_bears_fees(bearer: FeeBearer, is_split: bool) -> bool {
    !is_split || bearer == FeeBearer::Platform
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use proptest::prelude::*;

    fn config(events_bps: u32) -> Configuration {
        Configuration {
            id: ConfigurationId::new(),
            version: 1,
            commission_rates: CommissionRates {
                events: Percentage::from_bps(events_bps).unwrap(),
                ..CommissionRates::default()
            },
            is_active: true,
            updated_by: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn custom_rate_overrides_the_standard() {
        let configuration = config(500);
        assert_eq!(effective_rate(&configuration, None, Category::Events).bps(), 500);
        let custom = Percentage::from_bps(200).unwrap();
        assert_eq!(effective_rate(&configuration, Some(custom), Category::Events).bps(), 200);
    }

    #[test]
    fn platform_bears_fees_on_plain_charges() {
        let split = split_amounts(
            Money::from_minor(10_000),
            Money::from_minor(500),
            Money::from_minor(150),
            FeeBearer::Vendor,
            false,
        );
        assert_eq!(split.vendor_amount, Money::from_minor(9_500));
        assert_eq!(split.platform_amount, Money::from_minor(350));
        assert_eq!(split.gateway_fees, Money::from_minor(150));
    }

    #[test]
    fn vendor_bears_fees_on_split_charges() {
        let split = split_amounts(
            Money::from_minor(10_000),
            Money::from_minor(500),
            Money::from_minor(150),
            FeeBearer::Vendor,
            true,
        );
        assert_eq!(split.vendor_amount, Money::from_minor(9_500));
        assert_eq!(split.platform_amount, Money::from_minor(500));
        assert_eq!(split.gateway_fees, Money::from_minor(150));
    }

    proptest! {
        #[test]
        fn shares_reconcile_to_the_amount(
            amount in 0i64..100_000_000,
            bps in 0u32..=10_000,
            fees in 0i64..10_000,
            vendor_bears in any::<bool>(),
            is_split in any::<bool>(),
        ) {
            let amount = Money::from_minor(amount);
            let commission = Percentage::from_bps(bps).unwrap().of(amount);
            let bearer = if vendor_bears { FeeBearer::Vendor } else { FeeBearer::Platform };
            let fees = Money::from_minor(fees);
            let split = split_amounts(amount, commission, fees, bearer, is_split);

            let platform_borne = if platform_bears_fees(bearer, is_split) { fees } else { Money::ZERO };
            prop_assert_eq!(split.vendor_amount + split.platform_amount, amount - platform_borne);
        }
    }
}
