//! In-memory store for fast, deterministic tests.
//!
//! [`InMemoryStore`] implements every persistence port over one set of
//! tables behind a single lock, so each guarded operation is atomic the same
//! way a database transaction is.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only follows a panicking test

use marketplace_core::BoxFuture;
use marketplace_core::booking::{Booking, StatusChange};
use marketplace_core::commission::{CommissionRates, Configuration};
use marketplace_core::error::StoreError;
use marketplace_core::payment::{Payment, PaymentConfirmation, PaymentFailure};
use marketplace_core::settlement::{Settlement, SettlementSummary};
use marketplace_core::store::{
    BookingFilter, BookingStore, BookingTransition, ConfigurationStore, ConfirmOutcome,
    PaymentFilter, PaymentStore, SettlementStore, SettlementUpsert, StoreResult, VendorStore,
};
use marketplace_core::types::{
    BookingId, BookingPaymentStatus, BookingStatus, Category, ConfigurationId, Money, Percentage,
    PaymentId, SubaccountStatus, TransactionStatus, UserId,
};
use marketplace_core::vendor::{Subaccount, VendorProfile};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct Tables {
    bookings: HashMap<BookingId, Booking>,
    audit: Vec<StatusChange>,
    payments: HashMap<PaymentId, Payment>,
    references: HashMap<String, PaymentId>,
    vendors: HashMap<UserId, VendorProfile>,
    reservations: HashSet<UserId>,
    configurations: Vec<Configuration>,
    settlements: HashMap<String, Settlement>,
}

/// In-memory implementation of all store traits.
///
/// Cloning shares the underlying tables.
///
/// # Example
///
/// ```
/// use marketplace_testing::InMemoryStore;
/// use marketplace_core::store::ConfigurationStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryStore::new();
/// assert!(store.active_configuration().await?.is_none());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a database error, or recover
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Database("connection refused".into()));
        }
        Ok(())
    }

    /// Activate a configuration directly, bypassing the admin flow
    pub fn seed_configuration(&self, rates: CommissionRates) -> Configuration {
        let mut tables = self.tables.write().unwrap();
        activate(&mut tables, rates, None, Utc::now())
    }

    /// Insert or replace a vendor profile
    pub fn put_vendor(&self, profile: VendorProfile) {
        self.tables.write().unwrap().vendors.insert(profile.id, profile);
    }

    /// Insert or replace a booking without guards
    pub fn put_booking(&self, booking: Booking) {
        self.tables.write().unwrap().bookings.insert(booking.id, booking);
    }

    /// Snapshot of a booking
    #[must_use]
    pub fn booking(&self, id: BookingId) -> Option<Booking> {
        self.tables.read().unwrap().bookings.get(&id).cloned()
    }

    /// Snapshot of a payment by reference
    #[must_use]
    pub fn payment(&self, reference: &str) -> Option<Payment> {
        let tables = self.tables.read().unwrap();
        tables
            .references
            .get(reference)
            .and_then(|id| tables.payments.get(id))
            .cloned()
    }

    /// All payment attempts for a booking
    #[must_use]
    pub fn payments_for(&self, booking_id: BookingId) -> Vec<Payment> {
        self.tables
            .read()
            .unwrap()
            .payments
            .values()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect()
    }

    /// Number of stored configuration versions
    #[must_use]
    pub fn configuration_versions(&self) -> usize {
        self.tables.read().unwrap().configurations.len()
    }

    /// Snapshot of a vendor profile
    #[must_use]
    pub fn vendor(&self, id: UserId) -> Option<VendorProfile> {
        self.tables.read().unwrap().vendors.get(&id).cloned()
    }
}

fn activate(
    tables: &mut Tables,
    rates: CommissionRates,
    actor: Option<UserId>,
    at: DateTime<Utc>,
) -> Configuration {
    let version = tables
        .configurations
        .iter()
        .map(|c| c.version)
        .max()
        .unwrap_or(0)
        + 1;
    for configuration in &mut tables.configurations {
        configuration.is_active = false;
    }
    let configuration = Configuration {
        id: ConfigurationId::new(),
        version,
        commission_rates: rates,
        is_active: true,
        updated_by: actor,
        updated_at: at,
    };
    tables.configurations.push(configuration.clone());
    configuration
}

fn page<T>(mut rows: Vec<T>, limit: u32, offset: u32) -> Vec<T> {
    let offset = offset as usize;
    if offset >= rows.len() {
        return Vec::new();
    }
    rows.drain(..offset);
    rows.truncate(limit as usize);
    rows
}

impl BookingStore for InMemoryStore {
    fn insert_booking(&self, booking: Booking) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            self.check()?;
            let mut tables = self.tables.write().unwrap();
            if tables.bookings.contains_key(&booking.id)
                || tables.bookings.values().any(|b| b.code == booking.code)
            {
                return Err(StoreError::Duplicate(format!("booking {}", booking.code)));
            }
            tables.bookings.insert(booking.id, booking);
            Ok(())
        })
    }

    fn get_booking(&self, id: BookingId) -> BoxFuture<'_, StoreResult<Option<Booking>>> {
        Box::pin(async move {
            self.check()?;
            Ok(self.tables.read().unwrap().bookings.get(&id).cloned())
        })
    }

    fn list_bookings(&self, filter: BookingFilter) -> BoxFuture<'_, StoreResult<Vec<Booking>>> {
        Box::pin(async move {
            self.check()?;
            let mut rows: Vec<Booking> = self
                .tables
                .read()
                .unwrap()
                .bookings
                .values()
                .filter(|b| filter.matches(b))
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(page(rows, filter.limit, filter.offset))
        })
    }

    fn update_booking(&self, booking: Booking, audit: Option<StatusChange>) -> BoxFuture<'_, StoreResult<bool>> {
        Box::pin(async move {
            self.check()?;
            let mut tables = self.tables.write().unwrap();
            match tables.bookings.get_mut(&booking.id) {
                Some(stored) if stored.version == booking.version => {
                    *stored = Booking {
                        version: booking.version + 1,
                        ..booking
                    };
                },
                _ => return Ok(false),
            }
            if let Some(entry) = audit {
                tables.audit.push(entry);
            }
            Ok(true)
        })
    }

    fn status_history(&self, id: BookingId) -> BoxFuture<'_, StoreResult<Vec<StatusChange>>> {
        Box::pin(async move {
            self.check()?;
            Ok(self
                .tables
                .read()
                .unwrap()
                .audit
                .iter()
                .filter(|a| a.booking_id == id)
                .cloned()
                .collect())
        })
    }

    fn ping(&self) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move { self.check() })
    }
}

impl PaymentStore for InMemoryStore {
    fn open_attempt(&self, payment: Payment, booking: Booking) -> BoxFuture<'_, StoreResult<bool>> {
        Box::pin(async move {
            self.check()?;
            let mut tables = self.tables.write().unwrap();
            if tables.references.contains_key(&payment.reference) {
                return Err(StoreError::Duplicate(format!("payment {}", payment.reference)));
            }
            match tables.bookings.get_mut(&booking.id) {
                Some(stored)
                    if stored.status == BookingStatus::Pending
                        && stored.payment_status != BookingPaymentStatus::Paid =>
                {
                    stored.payment = Some(payment.id);
                    stored.payment_status = BookingPaymentStatus::Pending;
                    stored.updated_at = booking.updated_at;
                    stored.version += 1;
                },
                _ => return Ok(false),
            }
            tables.references.insert(payment.reference.clone(), payment.id);
            tables.payments.insert(payment.id, payment);
            Ok(true)
        })
    }

    fn find_by_reference<'a>(&'a self, reference: &'a str) -> BoxFuture<'a, StoreResult<Option<Payment>>> {
        Box::pin(async move {
            self.check()?;
            Ok(self.payment(reference))
        })
    }

    fn list_payments(&self, filter: PaymentFilter) -> BoxFuture<'_, StoreResult<Vec<Payment>>> {
        Box::pin(async move {
            self.check()?;
            let mut rows: Vec<Payment> = self
                .tables
                .read()
                .unwrap()
                .payments
                .values()
                .filter(|p| filter.matches(p))
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(page(rows, filter.limit, filter.offset))
        })
    }

    fn confirm_payment(
        &self,
        confirmation: PaymentConfirmation,
        transition: BookingTransition,
    ) -> BoxFuture<'_, StoreResult<ConfirmOutcome>> {
        Box::pin(async move {
            self.check()?;
            let mut guard = self.tables.write().unwrap();
            let tables = &mut *guard;
            let Some(payment_id) = tables.references.get(&confirmation.reference).copied() else {
                return Ok(ConfirmOutcome::UnknownReference);
            };
            let Some(payment) = tables.payments.get(&payment_id) else {
                return Ok(ConfirmOutcome::UnknownReference);
            };
            if payment.status == TransactionStatus::Success {
                return Ok(ConfirmOutcome::AlreadySucceeded);
            }
            // Same guard as the partial unique index on (booking_id) WHERE status = 'success'
            let booking_id = payment.booking_id;
            let paid_by = tables
                .payments
                .values()
                .find(|p| p.booking_id == booking_id && p.id != payment_id && p.status == TransactionStatus::Success)
                .map(|p| p.reference.clone());

            let Some(payment) = tables.payments.get_mut(&payment_id) else {
                return Ok(ConfirmOutcome::UnknownReference);
            };
            payment.paid_at = Some(confirmation.paid_at);
            payment.payment_method.clone_from(&confirmation.channel);
            payment.gateway_response.clone_from(&confirmation.gateway_response);
            payment.metadata.gateway_transaction_id = confirmation.gateway_transaction_id;
            payment.gateway_fees = confirmation.split.gateway_fees;
            payment.updated_at = transition.booking.updated_at;

            if let Some(paid_by) = paid_by {
                payment.status = TransactionStatus::Duplicate;
                payment.vendor_amount = Money::ZERO;
                payment.platform_amount = Money::ZERO;
                return Ok(ConfirmOutcome::Duplicate { paid_by });
            }
            payment.status = TransactionStatus::Success;
            payment.vendor_amount = confirmation.split.vendor_amount;
            payment.platform_amount = confirmation.split.platform_amount;

            let next = transition.booking;
            let outcome = match tables.bookings.get_mut(&next.id) {
                Some(stored) if stored.status == transition.expected => {
                    stored.status = next.status;
                    stored.payment = Some(payment_id);
                    stored.payment_status = next.payment_status;
                    stored.payment_reference = next.payment_reference;
                    stored.updated_at = next.updated_at;
                    stored.version += 1;
                    ConfirmOutcome::Applied
                },
                Some(stored) => {
                    stored.payment_status = BookingPaymentStatus::Paid;
                    stored.payment_reference = Some(confirmation.reference);
                    stored.version += 1;
                    ConfirmOutcome::BookingConflict {
                        status: Some(stored.status),
                    }
                },
                None => ConfirmOutcome::BookingConflict { status: None },
            };
            Ok(outcome)
        })
    }

    fn record_failure(&self, failure: PaymentFailure) -> BoxFuture<'_, StoreResult<bool>> {
        Box::pin(async move {
            self.check()?;
            let mut tables = self.tables.write().unwrap();
            let Some(payment_id) = tables.references.get(&failure.reference).copied() else {
                return Ok(false);
            };
            match tables.payments.get_mut(&payment_id) {
                Some(payment) if payment.status == TransactionStatus::Pending => {
                    payment.status = failure.status;
                    payment.gateway_response = failure.gateway_response;
                    payment.updated_at = Utc::now();
                    Ok(true)
                },
                _ => Ok(false),
            }
        })
    }
}

impl VendorStore for InMemoryStore {
    fn get_vendor(&self, id: UserId) -> BoxFuture<'_, StoreResult<Option<VendorProfile>>> {
        Box::pin(async move {
            self.check()?;
            Ok(self.vendor(id))
        })
    }

    fn find_by_subaccount<'a>(
        &'a self,
        subaccount_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<VendorProfile>>> {
        Box::pin(async move {
            self.check()?;
            Ok(self
                .tables
                .read()
                .unwrap()
                .vendors
                .values()
                .find(|v| {
                    v.subaccount
                        .as_ref()
                        .is_some_and(|s| s.subaccount_id == subaccount_id)
                })
                .cloned())
        })
    }

    fn list_subaccount_vendors(&self) -> BoxFuture<'_, StoreResult<Vec<VendorProfile>>> {
        Box::pin(async move {
            self.check()?;
            Ok(self
                .tables
                .read()
                .unwrap()
                .vendors
                .values()
                .filter(|v| v.subaccount.is_some())
                .cloned()
                .collect())
        })
    }

    fn reserve_subaccount(
        &self,
        id: UserId,
        preference: Option<Category>,
    ) -> BoxFuture<'_, StoreResult<bool>> {
        Box::pin(async move {
            self.check()?;
            let mut tables = self.tables.write().unwrap();
            if tables.reservations.contains(&id) {
                return Ok(false);
            }
            let profile = tables
                .vendors
                .entry(id)
                .or_insert_with(|| VendorProfile::new(id, preference));
            if profile.subaccount.is_some() {
                return Ok(false);
            }
            if profile.vendor_account_preference.is_none() {
                profile.vendor_account_preference = preference;
            }
            tables.reservations.insert(id);
            Ok(true)
        })
    }

    fn release_subaccount(&self, id: UserId) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            self.check()?;
            self.tables.write().unwrap().reservations.remove(&id);
            Ok(())
        })
    }

    fn save_subaccount(&self, id: UserId, subaccount: Subaccount) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            self.check()?;
            let mut tables = self.tables.write().unwrap();
            tables.reservations.remove(&id);
            tables
                .vendors
                .entry(id)
                .or_insert_with(|| VendorProfile::new(id, None))
                .subaccount = Some(subaccount);
            Ok(())
        })
    }

    fn set_commission_rate(
        &self,
        id: UserId,
        rate: Option<Percentage>,
    ) -> BoxFuture<'_, StoreResult<VendorProfile>> {
        Box::pin(async move {
            self.check()?;
            let mut tables = self.tables.write().unwrap();
            let profile = tables
                .vendors
                .entry(id)
                .or_insert_with(|| VendorProfile::new(id, None));
            profile.commission_rate = rate;
            Ok(profile.clone())
        })
    }
}

impl ConfigurationStore for InMemoryStore {
    fn active_configuration(&self) -> BoxFuture<'_, StoreResult<Option<Configuration>>> {
        Box::pin(async move {
            self.check()?;
            Ok(self
                .tables
                .read()
                .unwrap()
                .configurations
                .iter()
                .find(|c| c.is_active)
                .cloned())
        })
    }

    fn activate_configuration(
        &self,
        rates: CommissionRates,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> BoxFuture<'_, StoreResult<Configuration>> {
        Box::pin(async move {
            self.check()?;
            let mut tables = self.tables.write().unwrap();
            Ok(activate(&mut tables, rates, Some(actor), at))
        })
    }
}

impl SettlementStore for InMemoryStore {
    fn upsert_settlement(&self, settlement: Settlement) -> BoxFuture<'_, StoreResult<SettlementUpsert>> {
        Box::pin(async move {
            self.check()?;
            let mut tables = self.tables.write().unwrap();
            let created = !tables.settlements.contains_key(&settlement.settlement_id);

            let mut payments_updated = 0;
            let target = settlement.payment_status();
            for reference in &settlement.payment_references {
                let Some(id) = tables.references.get(reference).copied() else {
                    continue;
                };
                let Some(payment) = tables.payments.get_mut(&id) else {
                    continue;
                };
                if payment.status != TransactionStatus::Success {
                    continue;
                }
                let status_changed = target.is_some_and(|s| payment.settlement_status != s);
                let linked = payment.settlement_id.as_deref() != Some(settlement.settlement_id.as_str());
                if let Some(status) = target {
                    payment.settlement_status = status;
                }
                payment.settlement_id = Some(settlement.settlement_id.clone());
                if status_changed || linked {
                    payments_updated += 1;
                }
            }

            let entry = tables
                .settlements
                .entry(settlement.settlement_id.clone())
                .or_insert_with(|| settlement.clone());
            let created_at = entry.created_at;
            *entry = Settlement {
                created_at,
                ..settlement
            };

            Ok(SettlementUpsert {
                created,
                payments_updated,
            })
        })
    }

    fn list_settlements(&self, vendor: Option<UserId>) -> BoxFuture<'_, StoreResult<Vec<Settlement>>> {
        Box::pin(async move {
            self.check()?;
            let mut rows: Vec<Settlement> = self
                .tables
                .read()
                .unwrap()
                .settlements
                .values()
                .filter(|s| vendor.is_none_or(|v| s.vendor == Some(v)))
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(rows)
        })
    }

    fn settlement_summary(&self, vendor: Option<UserId>) -> BoxFuture<'_, StoreResult<SettlementSummary>> {
        Box::pin(async move {
            self.check()?;
            let tables = self.tables.read().unwrap();
            Ok(SettlementSummary::compute(
                tables
                    .settlements
                    .values()
                    .filter(|s| vendor.is_none_or(|v| s.vendor == Some(v))),
                tables
                    .payments
                    .values()
                    .filter(|p| vendor.is_none_or(|v| p.vendor == v)),
            ))
        })
    }
}

/// Builds an active sub-account for tests
#[must_use]
pub fn active_subaccount(subaccount_id: &str) -> Subaccount {
    let now = Utc::now();
    Subaccount {
        subaccount_id: subaccount_id.to_string(),
        status: SubaccountStatus::Active,
        business_name: "Lagos Leisure Ltd".into(),
        settlement_bank: "Test Bank".into(),
        bank_details: marketplace_core::vendor::BankDetails {
            account_number: "0123456789".into(),
            bank_code: "058".into(),
            account_name: Some("LAGOS LEISURE LTD".into()),
            bank_name: Some("Test Bank".into()),
        },
        last_verified_at: Some(now),
        created_at: now,
        updated_at: now,
    }
}
