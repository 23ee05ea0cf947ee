//! Bookings and their override audit trail.

use crate::{PostgresStore, Result, bind_u32, col, db_err, json, parse, to_json};
use marketplace_core::BoxFuture;
use marketplace_core::booking::{Booking, Coupon, StatusChange, VendorApproval};
use marketplace_core::details;
use marketplace_core::error::StoreError;
use marketplace_core::store::{BookingFilter, BookingStore};
use marketplace_core::types::{BookingId, BookingStatus, Category, Money, PaymentId, UserId};
use sqlx::postgres::PgRow;
use uuid::Uuid;

pub(crate) const BOOKING_COLUMNS: &str = "id, code, explorer_id, vendor_id, category, listing_id, \
     details, total_amount, service_fee, coupon, status, payment_id, payment_status, \
     payment_reference, vendor_approval, created_at, updated_at, version";

pub(crate) fn booking_from_row(row: &PgRow) -> Result<Booking> {
    let category: Category = parse(row, "category")?;
    let raw_details: serde_json::Value = col(row, "details")?;
    // Stored details go back through the validator like client input.
    let details = details::validate(category.as_str(), &raw_details)
        .map_err(|e| StoreError::Corrupt(format!("details: {e}")))?;
    let coupon: Coupon = json(col(row, "coupon")?, "coupon")?;
    let vendor_approval: Option<VendorApproval> = col::<Option<serde_json::Value>>(row, "vendor_approval")?
        .map(|v| json(v, "vendor_approval"))
        .transpose()?;

    Ok(Booking {
        id: BookingId::from_uuid(col(row, "id")?),
        code: col(row, "code")?,
        explorer: UserId::from_uuid(col(row, "explorer_id")?),
        vendor: UserId::from_uuid(col(row, "vendor_id")?),
        category,
        listing_id: col(row, "listing_id")?,
        details,
        total_amount: Money::from_minor(col(row, "total_amount")?),
        service_fee: Money::from_minor(col(row, "service_fee")?),
        coupon,
        status: parse(row, "status")?,
        payment: col::<Option<Uuid>>(row, "payment_id")?.map(PaymentId::from_uuid),
        payment_status: parse(row, "payment_status")?,
        payment_reference: col(row, "payment_reference")?,
        vendor_approval,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
        version: col(row, "version")?,
    })
}

fn audit_from_row(row: &PgRow) -> Result<StatusChange> {
    Ok(StatusChange {
        booking_id: BookingId::from_uuid(col(row, "booking_id")?),
        from: parse(row, "from_status")?,
        to: parse(row, "to_status")?,
        actor: UserId::from_uuid(col(row, "actor_id")?),
        role: parse(row, "actor_role")?,
        reason: col(row, "reason")?,
        at: col(row, "created_at")?,
    })
}

/// Writes the mutable booking columns if the stored row is still at
/// `booking.version`. Returns the number of rows touched.
async fn write_booking<'c, E>(executor: E, booking: &Booking) -> Result<u64>
where
    E: sqlx::Executor<'c, Database = sqlx::Postgres>,
{
    let approval = booking
        .vendor_approval
        .as_ref()
        .map(to_json)
        .transpose()?;
    let result = sqlx::query(
        r"
        UPDATE bookings
        SET status = $2,
            payment_id = $3,
            payment_status = $4,
            payment_reference = $5,
            vendor_approval = $6,
            updated_at = $7,
            version = version + 1
        WHERE id = $1 AND version = $8
        ",
    )
    .bind(booking.id.as_uuid())
    .bind(booking.status.as_str())
    .bind(booking.payment.map(|p| *p.as_uuid()))
    .bind(booking.payment_status.as_str())
    .bind(booking.payment_reference.as_deref())
    .bind(approval)
    .bind(booking.updated_at)
    .bind(booking.version)
    .execute(executor)
    .await
    .map_err(db_err)?;
    Ok(result.rows_affected())
}

impl BookingStore for PostgresStore {
    fn insert_booking(&self, booking: Booking) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let approval = booking
                .vendor_approval
                .as_ref()
                .map(to_json)
                .transpose()?;
            sqlx::query(
                r"
                INSERT INTO bookings (
                    id, code, explorer_id, vendor_id, category, listing_id, details,
                    total_amount, service_fee, coupon, status, payment_id, payment_status,
                    payment_reference, vendor_approval, created_at, updated_at, version
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
                ",
            )
            .bind(booking.id.as_uuid())
            .bind(&booking.code)
            .bind(booking.explorer.as_uuid())
            .bind(booking.vendor.as_uuid())
            .bind(booking.category.as_str())
            .bind(&booking.listing_id)
            .bind(booking.details.to_value())
            .bind(booking.total_amount.minor())
            .bind(booking.service_fee.minor())
            .bind(to_json(&booking.coupon)?)
            .bind(booking.status.as_str())
            .bind(booking.payment.map(|p| *p.as_uuid()))
            .bind(booking.payment_status.as_str())
            .bind(booking.payment_reference.as_deref())
            .bind(approval)
            .bind(booking.created_at)
            .bind(booking.updated_at)
            .bind(booking.version)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

            tracing::debug!(booking_id = %booking.id, code = %booking.code, "Booking inserted");
            Ok(())
        })
    }

    fn get_booking(&self, id: BookingId) -> BoxFuture<'_, Result<Option<Booking>>> {
        Box::pin(async move {
            let row = sqlx::query(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
            row.as_ref().map(booking_from_row).transpose()
        })
    }

    fn list_bookings(&self, filter: BookingFilter) -> BoxFuture<'_, Result<Vec<Booking>>> {
        Box::pin(async move {
            let rows = sqlx::query(&format!(
                r"
                SELECT {BOOKING_COLUMNS} FROM bookings
                WHERE ($1::uuid IS NULL OR explorer_id = $1)
                  AND ($2::uuid IS NULL OR vendor_id = $2)
                  AND ($3::text IS NULL OR status = $3)
                  AND ($4::text IS NULL OR category = $4)
                ORDER BY created_at DESC
                LIMIT $5 OFFSET $6
                "
            ))
            .bind(filter.explorer.map(|u| *u.as_uuid()))
            .bind(filter.vendor.map(|u| *u.as_uuid()))
            .bind(filter.status.map(BookingStatus::as_str))
            .bind(filter.category.map(Category::as_str))
            .bind(bind_u32(filter.limit))
            .bind(bind_u32(filter.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
            rows.iter().map(booking_from_row).collect()
        })
    }

    fn update_booking(&self, booking: Booking, audit: Option<StatusChange>) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_err)?;

            if write_booking(&mut *tx, &booking).await? == 0 {
                tx.rollback().await.map_err(db_err)?;
                tracing::debug!(
                    booking_id = %booking.id,
                    version = booking.version,
                    "Booking update skipped, row changed concurrently"
                );
                return Ok(false);
            }

            if let Some(entry) = audit {
                sqlx::query(
                    r"
                    INSERT INTO booking_audit (
                        booking_id, from_status, to_status, actor_id, actor_role, reason, created_at
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                    ",
                )
                .bind(entry.booking_id.as_uuid())
                .bind(entry.from.as_str())
                .bind(entry.to.as_str())
                .bind(entry.actor.as_uuid())
                .bind(entry.role.as_str())
                .bind(&entry.reason)
                .bind(entry.at)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            }

            tx.commit().await.map_err(db_err)?;
            Ok(true)
        })
    }

    fn status_history(&self, id: BookingId) -> BoxFuture<'_, Result<Vec<StatusChange>>> {
        Box::pin(async move {
            let rows = sqlx::query(
                r"
                SELECT booking_id, from_status, to_status, actor_id, actor_role, reason, created_at
                FROM booking_audit
                WHERE booking_id = $1
                ORDER BY id ASC
                ",
            )
            .bind(id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
            rows.iter().map(audit_from_row).collect()
        })
    }

    fn ping(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
            Ok(())
        })
    }
}
