//! Payment attempts and the atomic confirmation step.

use crate::{PostgresStore, Result, bind_u32, col, db_err, json, parse, to_json};
use marketplace_core::BoxFuture;
use marketplace_core::booking::Booking;
use marketplace_core::error::StoreError;
use marketplace_core::payment::{Payment, PaymentConfirmation, PaymentFailure};
use marketplace_core::store::{BookingTransition, ConfirmOutcome, PaymentFilter, PaymentStore};
use marketplace_core::types::{
    BookingId, BookingPaymentStatus, BookingStatus, Money, PaymentId, TransactionStatus, UserId,
};
use sqlx::postgres::PgRow;
use uuid::Uuid;

const PAYMENT_COLUMNS: &str = "id, booking_id, vendor_id, explorer_id, reference, amount, currency, \
     status, payment_method, customer_email, customer_name, metadata, paid_at, settlement_id, \
     settlement_status, vendor_amount, platform_amount, gateway_fees, gateway_response, \
     created_at, updated_at";

fn payment_from_row(row: &PgRow) -> Result<Payment> {
    Ok(Payment {
        id: PaymentId::from_uuid(col(row, "id")?),
        booking_id: BookingId::from_uuid(col(row, "booking_id")?),
        vendor: UserId::from_uuid(col(row, "vendor_id")?),
        explorer: UserId::from_uuid(col(row, "explorer_id")?),
        reference: col(row, "reference")?,
        amount: Money::from_minor(col(row, "amount")?),
        currency: col(row, "currency")?,
        status: parse(row, "status")?,
        payment_method: col(row, "payment_method")?,
        customer_email: col(row, "customer_email")?,
        customer_name: col(row, "customer_name")?,
        metadata: json(col(row, "metadata")?, "metadata")?,
        paid_at: col(row, "paid_at")?,
        settlement_id: col(row, "settlement_id")?,
        settlement_status: parse(row, "settlement_status")?,
        vendor_amount: Money::from_minor(col(row, "vendor_amount")?),
        platform_amount: Money::from_minor(col(row, "platform_amount")?),
        gateway_fees: Money::from_minor(col(row, "gateway_fees")?),
        gateway_response: col(row, "gateway_response")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

impl PaymentStore for PostgresStore {
    fn open_attempt(&self, payment: Payment, booking: Booking) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_err)?;

            // Claim the booking first so a paid or moved booking never gets
            // an orphan attempt.
            let claimed = sqlx::query(
                r"
                UPDATE bookings
                SET payment_id = $2, payment_status = 'pending', updated_at = $3, version = version + 1
                WHERE id = $1 AND status = 'pending' AND payment_status <> 'paid'
                ",
            )
            .bind(booking.id.as_uuid())
            .bind(payment.id.as_uuid())
            .bind(booking.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            if claimed.rows_affected() == 0 {
                tx.rollback().await.map_err(db_err)?;
                tracing::debug!(booking_id = %booking.id, "Booking no longer payable");
                return Ok(false);
            }

            sqlx::query(
                r"
                INSERT INTO payments (
                    id, booking_id, vendor_id, explorer_id, reference, amount, currency, status,
                    payment_method, customer_email, customer_name, metadata, paid_at,
                    settlement_id, settlement_status, vendor_amount, platform_amount,
                    gateway_fees, gateway_response, created_at, updated_at
                ) VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21
                )
                ",
            )
            .bind(payment.id.as_uuid())
            .bind(payment.booking_id.as_uuid())
            .bind(payment.vendor.as_uuid())
            .bind(payment.explorer.as_uuid())
            .bind(&payment.reference)
            .bind(payment.amount.minor())
            .bind(&payment.currency)
            .bind(payment.status.as_str())
            .bind(payment.payment_method.as_deref())
            .bind(&payment.customer_email)
            .bind(payment.customer_name.as_deref())
            .bind(to_json(&payment.metadata)?)
            .bind(payment.paid_at)
            .bind(payment.settlement_id.as_deref())
            .bind(payment.settlement_status.as_str())
            .bind(payment.vendor_amount.minor())
            .bind(payment.platform_amount.minor())
            .bind(payment.gateway_fees.minor())
            .bind(payment.gateway_response.as_deref())
            .bind(payment.created_at)
            .bind(payment.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            tx.commit().await.map_err(db_err)?;
            tracing::info!(
                reference = %payment.reference,
                booking_id = %payment.booking_id,
                amount = %payment.amount,
                "Payment attempt opened"
            );
            Ok(true)
        })
    }

    fn find_by_reference<'a>(&'a self, reference: &'a str) -> BoxFuture<'a, Result<Option<Payment>>> {
        Box::pin(async move {
            let row = sqlx::query(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE reference = $1"))
                .bind(reference)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
            row.as_ref().map(payment_from_row).transpose()
        })
    }

    fn list_payments(&self, filter: PaymentFilter) -> BoxFuture<'_, Result<Vec<Payment>>> {
        Box::pin(async move {
            let rows = sqlx::query(&format!(
                r"
                SELECT {PAYMENT_COLUMNS} FROM payments
                WHERE ($1::uuid IS NULL OR explorer_id = $1)
                  AND ($2::uuid IS NULL OR vendor_id = $2)
                  AND ($3::uuid IS NULL OR booking_id = $3)
                  AND ($4::text IS NULL OR status = $4)
                ORDER BY created_at DESC
                LIMIT $5 OFFSET $6
                "
            ))
            .bind(filter.explorer.map(|u| *u.as_uuid()))
            .bind(filter.vendor.map(|u| *u.as_uuid()))
            .bind(filter.booking_id.map(|b| *b.as_uuid()))
            .bind(filter.status.map(TransactionStatus::as_str))
            .bind(bind_u32(filter.limit))
            .bind(bind_u32(filter.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
            rows.iter().map(payment_from_row).collect()
        })
    }

    fn confirm_payment(
        &self,
        confirmation: PaymentConfirmation,
        transition: BookingTransition,
    ) -> BoxFuture<'_, Result<ConfirmOutcome>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_err)?;

            // The row lock plus the status check is the idempotency point: of
            // two concurrent confirmations only one sees a non-success row.
            let Some(row) = sqlx::query("SELECT id, booking_id, status FROM payments WHERE reference = $1 FOR UPDATE")
                .bind(&confirmation.reference)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?
            else {
                tx.rollback().await.map_err(db_err)?;
                return Ok(ConfirmOutcome::UnknownReference);
            };
            let payment_id: Uuid = col(&row, "id")?;
            let booking_id: Uuid = col(&row, "booking_id")?;
            let status: TransactionStatus = parse(&row, "status")?;
            if status == TransactionStatus::Success {
                tx.rollback().await.map_err(db_err)?;
                return Ok(ConfirmOutcome::AlreadySucceeded);
            }

            // Attempts of one booking confirm one at a time.
            sqlx::query("SELECT 1 FROM bookings WHERE id = $1 FOR UPDATE")
                .bind(booking_id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            let paid_by: Option<String> = sqlx::query_scalar(
                "SELECT reference FROM payments WHERE booking_id = $1 AND status = 'success' AND id <> $2",
            )
            .bind(booking_id)
            .bind(payment_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;

            let (recorded, split) = match &paid_by {
                Some(_) => (TransactionStatus::Duplicate, (0, 0)),
                None => (
                    TransactionStatus::Success,
                    (
                        confirmation.split.vendor_amount.minor(),
                        confirmation.split.platform_amount.minor(),
                    ),
                ),
            };
            sqlx::query(
                r"
                UPDATE payments
                SET status = $2,
                    paid_at = $3,
                    payment_method = $4,
                    gateway_response = $5,
                    metadata = jsonb_set(metadata, '{gatewayTransactionId}', COALESCE(to_jsonb($6::BIGINT), 'null'::jsonb)),
                    vendor_amount = $7,
                    platform_amount = $8,
                    gateway_fees = $9,
                    updated_at = $10
                WHERE id = $1
                ",
            )
            .bind(payment_id)
            .bind(recorded.as_str())
            .bind(confirmation.paid_at)
            .bind(confirmation.channel.as_deref())
            .bind(confirmation.gateway_response.as_deref())
            .bind(confirmation.gateway_transaction_id)
            .bind(split.0)
            .bind(split.1)
            .bind(confirmation.split.gateway_fees.minor())
            .bind(transition.booking.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            if let Some(paid_by) = paid_by {
                tx.commit().await.map_err(db_err)?;
                tracing::warn!(
                    reference = %confirmation.reference,
                    paid_by = %paid_by,
                    "Booking already paid by another attempt, charge recorded as duplicate"
                );
                return Ok(ConfirmOutcome::Duplicate { paid_by });
            }

            let next = &transition.booking;
            let applied = sqlx::query(
                r"
                UPDATE bookings
                SET status = $2,
                    payment_id = $3,
                    payment_status = $4,
                    payment_reference = $5,
                    updated_at = $6,
                    version = version + 1
                WHERE id = $1 AND status = $7
                ",
            )
            .bind(booking_id)
            .bind(next.status.as_str())
            .bind(payment_id)
            .bind(next.payment_status.as_str())
            .bind(next.payment_reference.as_deref())
            .bind(next.updated_at)
            .bind(transition.expected.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();

            let outcome = if applied == 1 {
                ConfirmOutcome::Applied
            } else {
                let status: Option<String> = sqlx::query_scalar(
                    r"
                    UPDATE bookings
                    SET payment_status = $2, payment_reference = $3, updated_at = $4, version = version + 1
                    WHERE id = $1
                    RETURNING status
                    ",
                )
                .bind(booking_id)
                .bind(BookingPaymentStatus::Paid.as_str())
                .bind(&confirmation.reference)
                .bind(next.updated_at)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;

                let status = status
                    .map(|s| s.parse::<BookingStatus>())
                    .transpose()
                    .map_err(|e| StoreError::Corrupt(format!("status: {e}")))?;
                tracing::warn!(
                    reference = %confirmation.reference,
                    booking_id = %next.id,
                    expected = %transition.expected,
                    found = ?status,
                    "Booking moved before confirmation was written"
                );
                ConfirmOutcome::BookingConflict { status }
            };

            tx.commit().await.map_err(db_err)?;
            Ok(outcome)
        })
    }

    fn record_failure(&self, failure: PaymentFailure) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                UPDATE payments
                SET status = $2, gateway_response = $3, updated_at = now()
                WHERE reference = $1 AND status = 'pending'
                ",
            )
            .bind(&failure.reference)
            .bind(failure.status.as_str())
            .bind(failure.gateway_response.as_deref())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
            Ok(result.rows_affected() == 1)
        })
    }
}
