//! Settlement ingestion and reporting.
//!
//! Batches come either from an admin push or from polling the gateway per
//! vendor sub-account. Ingestion is an upsert keyed by the gateway's
//! settlement id, so replaying a batch changes nothing.

use super::Collaborators;
use crate::auth::SessionUser;
use marketplace_core::error::Result;
use marketplace_core::gateway::SettlementReport;
use marketplace_core::settlement::{Settlement, SettlementSummary};
use marketplace_core::store::SettlementUpsert;
use marketplace_core::types::Role;
use serde::Serialize;

/// Totals of one sync run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    /// Vendors polled
    pub vendors: usize,
    /// Batches seen
    pub batches: usize,
    /// Batches seen for the first time
    pub created: usize,
    /// Payments whose settlement status or link changed
    pub payments_updated: u64,
    /// Vendors whose settlements could not be fetched
    pub failures: usize,
}

/// Settlement operations
#[derive(Clone)]
pub struct SettlementService {
    ports: Collaborators,
}

impl SettlementService {
    /// Creates the service
    #[must_use]
    pub fn new(ports: Collaborators) -> Self {
        Self { ports }
    }

    /// Records a batch pushed by an admin.
    ///
    /// # Errors
    ///
    /// `FORBIDDEN` for non-admins, store failures.
    pub async fn ingest(&self, session: &SessionUser, report: SettlementReport) -> Result<SettlementUpsert> {
        session.require(Role::Admin)?;
        self.ingest_report(report).await
    }

    /// Records a batch and moves the included payments' settlement status.
    ///
    /// References that match no payment are logged and skipped.
    ///
    /// # Errors
    ///
    /// Store failures.
    #[tracing::instrument(skip_all, fields(settlement_id = %report.settlement_id))]
    pub async fn ingest_report(&self, report: SettlementReport) -> Result<SettlementUpsert> {
        let vendor = match report.subaccount_id.as_deref() {
            Some(subaccount_id) => {
                let owner = self.ports.vendors.find_by_subaccount(subaccount_id).await?;
                if owner.is_none() {
                    tracing::warn!(subaccount_id, "Settlement for an unknown sub-account");
                }
                owner.map(|v| v.id)
            },
            None => None,
        };

        for reference in &report.payment_references {
            if self.ports.payments.find_by_reference(reference).await?.is_none() {
                tracing::warn!(reference = %reference, "Settlement references an unknown payment, skipping");
            }
        }

        let now = self.ports.clock.now();
        let upsert = self
            .ports
            .settlements
            .upsert_settlement(Settlement {
                settlement_id: report.settlement_id,
                vendor,
                subaccount_id: report.subaccount_id,
                total_amount: report.total_amount,
                currency: report.currency,
                status: report.status,
                settled_at: report.settled_at,
                payment_references: report.payment_references,
                created_at: now,
                updated_at: now,
            })
            .await?;
        tracing::info!(
            created = upsert.created,
            payments_updated = upsert.payments_updated,
            status = %report.status,
            "Settlement recorded"
        );
        Ok(upsert)
    }

    /// Polls the gateway for every vendor with a sub-account.
    ///
    /// A vendor whose settlements cannot be fetched is logged and skipped.
    ///
    /// # Errors
    ///
    /// `FORBIDDEN` for non-admins, store failures.
    pub async fn sync(&self, session: &SessionUser) -> Result<SyncSummary> {
        session.require(Role::Admin)?;
        let mut summary = SyncSummary::default();
        for vendor in self.ports.vendors.list_subaccount_vendors().await? {
            let Some(subaccount) = vendor.subaccount else {
                continue;
            };
            summary.vendors += 1;
            let reports = match self
                .ports
                .gateway
                .list_settlements(Some(&subaccount.subaccount_id))
                .await
            {
                Ok(reports) => reports,
                Err(e) => {
                    tracing::warn!(vendor = %vendor.id, error = %e, "Could not fetch settlements");
                    summary.failures += 1;
                    continue;
                },
            };
            for report in reports {
                summary.batches += 1;
                let upsert = self.ingest_report(report).await?;
                if upsert.created {
                    summary.created += 1;
                }
                summary.payments_updated += upsert.payments_updated;
            }
        }
        tracing::info!(?summary, "Settlement sync finished");
        Ok(summary)
    }

    /// Settlements visible to the caller.
    ///
    /// # Errors
    ///
    /// `FORBIDDEN` for explorers.
    pub async fn list(&self, session: &SessionUser) -> Result<Vec<Settlement>> {
        let vendor = session.vendor_scope()?;
        Ok(self.ports.settlements.list_settlements(vendor).await?)
    }

    /// Settled, pending and failed totals for the caller.
    ///
    /// # Errors
    ///
    /// `FORBIDDEN` for explorers.
    pub async fn summary(&self, session: &SessionUser) -> Result<SettlementSummary> {
        let vendor = session.vendor_scope()?;
        Ok(self.ports.settlements.settlement_summary(vendor).await?)
    }
}
