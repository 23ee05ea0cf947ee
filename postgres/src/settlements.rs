//! Settlement batches and payout summaries.

use crate::{PostgresStore, Result, col, db_err, parse};
use marketplace_core::BoxFuture;
use marketplace_core::error::StoreError;
use marketplace_core::settlement::{Settlement, SettlementSummary, StatusTotal};
use marketplace_core::store::{SettlementStore, SettlementUpsert};
use marketplace_core::types::{Money, SettlementBatchStatus, SettlementStatus, UserId};
use sqlx::postgres::PgRow;
use uuid::Uuid;

fn settlement_from_row(row: &PgRow) -> Result<Settlement> {
    Ok(Settlement {
        settlement_id: col(row, "settlement_id")?,
        vendor: col::<Option<Uuid>>(row, "vendor_id")?.map(UserId::from_uuid),
        subaccount_id: col(row, "subaccount_id")?,
        total_amount: Money::from_minor(col(row, "total_amount")?),
        currency: col(row, "currency")?,
        status: parse(row, "status")?,
        settled_at: col(row, "settled_at")?,
        payment_references: col(row, "payment_references")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn count(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative count {value}")))
}

impl SettlementStore for PostgresStore {
    fn upsert_settlement(&self, settlement: Settlement) -> BoxFuture<'_, Result<SettlementUpsert>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_err)?;

            let created: bool = sqlx::query_scalar(
                r"
                INSERT INTO settlements (
                    settlement_id, vendor_id, subaccount_id, total_amount, currency, status,
                    settled_at, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (settlement_id) DO UPDATE
                SET vendor_id = EXCLUDED.vendor_id,
                    subaccount_id = EXCLUDED.subaccount_id,
                    total_amount = EXCLUDED.total_amount,
                    currency = EXCLUDED.currency,
                    status = EXCLUDED.status,
                    settled_at = EXCLUDED.settled_at,
                    updated_at = EXCLUDED.updated_at
                RETURNING (xmax = 0) AS created
                ",
            )
            .bind(&settlement.settlement_id)
            .bind(settlement.vendor.map(|v| *v.as_uuid()))
            .bind(settlement.subaccount_id.as_deref())
            .bind(settlement.total_amount.minor())
            .bind(&settlement.currency)
            .bind(settlement.status.as_str())
            .bind(settlement.settled_at)
            .bind(settlement.created_at)
            .bind(settlement.updated_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

            sqlx::query(
                r"
                INSERT INTO settlement_payments (settlement_id, reference)
                SELECT $1, unnest($2::text[])
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(&settlement.settlement_id)
            .bind(&settlement.payment_references)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            // Only successful payments are paid out; a row counts when its
            // link or payout status actually changes.
            let target = settlement.payment_status();
            let updated = sqlx::query(
                r"
                UPDATE payments
                SET settlement_id = $1,
                    settlement_status = COALESCE($3, settlement_status),
                    updated_at = now()
                WHERE reference = ANY($2)
                  AND status = 'success'
                  AND (settlement_id IS DISTINCT FROM $1
                       OR ($3::text IS NOT NULL AND settlement_status <> $3))
                ",
            )
            .bind(&settlement.settlement_id)
            .bind(&settlement.payment_references)
            .bind(target.map(SettlementStatus::as_str))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            tx.commit().await.map_err(db_err)?;

            let result = SettlementUpsert {
                created,
                payments_updated: updated.rows_affected(),
            };
            tracing::info!(
                settlement_id = %settlement.settlement_id,
                status = %settlement.status,
                created = result.created,
                payments_updated = result.payments_updated,
                "Settlement recorded"
            );
            Ok(result)
        })
    }

    fn list_settlements(&self, vendor: Option<UserId>) -> BoxFuture<'_, Result<Vec<Settlement>>> {
        Box::pin(async move {
            let rows = sqlx::query(
                r"
                SELECT s.settlement_id, s.vendor_id, s.subaccount_id, s.total_amount, s.currency,
                       s.status, s.settled_at, s.created_at, s.updated_at,
                       COALESCE(array_agg(sp.reference ORDER BY sp.reference)
                                FILTER (WHERE sp.reference IS NOT NULL), '{}') AS payment_references
                FROM settlements s
                LEFT JOIN settlement_payments sp ON sp.settlement_id = s.settlement_id
                WHERE ($1::uuid IS NULL OR s.vendor_id = $1)
                GROUP BY s.settlement_id
                ORDER BY s.created_at DESC
                ",
            )
            .bind(vendor.map(|v| *v.as_uuid()))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
            rows.iter().map(settlement_from_row).collect()
        })
    }

    fn settlement_summary(&self, vendor: Option<UserId>) -> BoxFuture<'_, Result<SettlementSummary>> {
        Box::pin(async move {
            let vendor_id = vendor.map(|v| *v.as_uuid());
            let rows = sqlx::query(
                r"
                SELECT status, COUNT(*) AS count, COALESCE(SUM(total_amount), 0)::BIGINT AS amount
                FROM settlements
                WHERE ($1::uuid IS NULL OR vendor_id = $1)
                GROUP BY status
                ",
            )
            .bind(vendor_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

            let mut summary = SettlementSummary::default();
            for row in &rows {
                let status: SettlementBatchStatus = parse(row, "status")?;
                let total = StatusTotal {
                    count: count(col(row, "count")?)?,
                    amount: Money::from_minor(col(row, "amount")?),
                };
                let bucket = match status {
                    SettlementBatchStatus::Success => &mut summary.settled,
                    SettlementBatchStatus::Pending => &mut summary.pending,
                    SettlementBatchStatus::Failed | SettlementBatchStatus::Cancelled => &mut summary.failed,
                };
                bucket.count += total.count;
                bucket.amount = bucket.amount + total.amount;
            }

            let pending = sqlx::query(
                r"
                SELECT COUNT(*) AS count, COALESCE(SUM(vendor_amount), 0)::BIGINT AS amount
                FROM payments
                WHERE status = 'success' AND settlement_status = 'pending'
                  AND ($1::uuid IS NULL OR vendor_id = $1)
                ",
            )
            .bind(vendor_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
            summary.pending_payments = count(col(&pending, "count")?)?;
            summary.pending_payout = Money::from_minor(col(&pending, "amount")?);

            Ok(summary)
        })
    }
}
