//! Payment reconciliation.
//!
//! The single entry point for moving a payment out of `pending`. Both the
//! webhook and client-initiated verification land here, and every path
//! re-verifies with the gateway instead of trusting the caller. The
//! store's guarded confirmation makes the success transition happen at most
//! once per reference, however many signals race.

use super::Collaborators;
use super::effects::run_effects;
use crate::metrics;
use marketplace_core::booking::{BookingAction, BookingEnvironment, BookingReducer, BookingState};
use marketplace_core::commission::split_amounts;
use marketplace_core::error::{MarketplaceError, Result, TransitionError};
use marketplace_core::gateway::{GatewayStatus, TransactionSnapshot};
use marketplace_core::payment::{Payment, PaymentConfirmation, PaymentFailure};
use marketplace_core::reducer::Reducer;
use marketplace_core::store::{BookingTransition, ConfirmOutcome};
use marketplace_core::types::{BookingStatus, Money, TransactionStatus};
use serde::Serialize;

/// What a reconciliation did
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// No payment carries the reference
    UnknownReference,
    /// Payment moved to success and the booking was confirmed
    Confirmed,
    /// The payment was already successful; nothing changed
    AlreadyConfirmed,
    /// Money was collected but the booking could not be confirmed
    Anomaly {
        /// Booking status found
        status: Option<BookingStatus>,
    },
    /// The gateway reports a terminal non-success status
    NotSuccessful {
        /// Recorded status
        status: TransactionStatus,
    },
    /// The gateway is still processing
    InFlight {
        /// Gateway status string
        status: String,
    },
    /// The charge went through after another attempt had already paid the
    /// booking; it is recorded as `duplicate` and owed back to the payer
    DuplicateCharge {
        /// Reference of the attempt that paid the booking
        paid_by: Option<String>,
    },
    /// The gateway charged a different amount than requested
    AmountMismatch {
        /// Amount of the payment attempt
        expected: Money,
        /// Amount the gateway reports
        charged: Money,
    },
}

/// Versioned booking writes retried before giving up
const WRITE_ATTEMPTS: usize = 3;

/// Outcome plus the verification it was based on
#[derive(Clone, Debug)]
pub struct ReconcileReport {
    /// Gateway reference
    pub reference: String,
    /// What happened
    pub outcome: ReconcileOutcome,
    /// Gateway verification, when the gateway was asked
    pub snapshot: Option<TransactionSnapshot>,
}

/// Drives payments to their terminal status
#[derive(Clone)]
pub struct Reconciler {
    ports: Collaborators,
    env: BookingEnvironment,
}

impl Reconciler {
    /// Creates a reconciler over the shared ports
    #[must_use]
    pub fn new(ports: Collaborators) -> Self {
        let env = BookingEnvironment::new(ports.clock.clone(), ports.notifier.clone());
        Self { ports, env }
    }

    /// Verifies `reference` with the gateway and applies the result.
    ///
    /// Idempotent: the n-th success signal for a reference changes nothing
    /// and sends no notification.
    ///
    /// # Errors
    ///
    /// Gateway failures (the payment stays pending) and store failures.
    #[tracing::instrument(skip_all, fields(reference = %reference))]
    pub async fn reconcile(&self, reference: &str) -> Result<ReconcileReport> {
        let Some(payment) = self.ports.payments.find_by_reference(reference).await? else {
            tracing::warn!("No payment for reference, ignoring");
            return Ok(ReconcileReport {
                reference: reference.to_string(),
                outcome: ReconcileOutcome::UnknownReference,
                snapshot: None,
            });
        };

        let snapshot = self.ports.gateway.verify(reference).await.map_err(|e| {
            tracing::warn!(error = %e, "Gateway verification failed, payment stays pending");
            MarketplaceError::Gateway(e)
        })?;

        let outcome = match &snapshot.status {
            GatewayStatus::Success => self.apply_success(&payment, &snapshot).await?,
            status @ (GatewayStatus::Failed | GatewayStatus::Abandoned) => {
                let recorded = status.failure_status().unwrap_or(TransactionStatus::Failed);
                self.apply_failure(&payment, recorded, snapshot.gateway_response.clone())
                    .await?
            },
            GatewayStatus::InFlight(status) => {
                tracing::debug!(status = %status, "Transaction still in flight");
                ReconcileOutcome::InFlight {
                    status: status.clone(),
                }
            },
        };

        Ok(ReconcileReport {
            reference: reference.to_string(),
            outcome,
            snapshot: Some(snapshot),
        })
    }

    async fn apply_success(&self, payment: &Payment, snapshot: &TransactionSnapshot) -> Result<ReconcileOutcome> {
        if payment.status == TransactionStatus::Success {
            metrics::record_duplicate_confirmation();
            tracing::info!("Payment already confirmed");
            return Ok(ReconcileOutcome::AlreadyConfirmed);
        }

        let currency_matches = snapshot.currency.is_empty() || snapshot.currency.eq_ignore_ascii_case(&payment.currency);
        if snapshot.amount != payment.amount || !currency_matches {
            tracing::error!(
                expected = %payment.amount,
                charged = %snapshot.amount,
                currency = %snapshot.currency,
                "Charged amount does not match the payment attempt, refusing confirmation"
            );
            let diagnostic = format!(
                "amount mismatch: expected {} {}, charged {} {}",
                payment.amount, payment.currency, snapshot.amount, snapshot.currency
            );
            self.apply_failure(payment, TransactionStatus::Failed, Some(diagnostic))
                .await?;
            return Ok(ReconcileOutcome::AmountMismatch {
                expected: payment.amount,
                charged: snapshot.amount,
            });
        }

        let booking = self
            .ports
            .bookings
            .get_booking(payment.booking_id)
            .await?
            .ok_or_else(|| MarketplaceError::not_found("booking", payment.booking_id))?;
        if payment.status == TransactionStatus::Duplicate {
            tracing::info!("Duplicate charge already recorded");
            return Ok(ReconcileOutcome::DuplicateCharge {
                paid_by: booking.payment_reference,
            });
        }
        let expected = booking.status;

        let mut state = BookingState::new(booking);
        let effects = BookingReducer.reduce(
            &mut state,
            BookingAction::ConfirmPayment {
                reference: payment.reference.clone(),
                amount: payment.amount,
            },
            &self.env,
        );
        let rejected = state.last_error.take();

        let metadata = &payment.metadata;
        let confirmation = PaymentConfirmation {
            reference: payment.reference.clone(),
            paid_at: snapshot.paid_at.unwrap_or_else(|| self.ports.clock.now()),
            channel: snapshot.channel.clone(),
            gateway_transaction_id: snapshot.gateway_id,
            gateway_response: snapshot.gateway_response.clone(),
            split: split_amounts(
                payment.amount,
                metadata.commission,
                snapshot.fees,
                metadata.fee_bearer,
                metadata.split,
            ),
        };
        let transition = BookingTransition {
            booking: state.booking,
            expected,
        };

        let outcome = match self.ports.payments.confirm_payment(confirmation, transition).await? {
            ConfirmOutcome::Applied => {
                metrics::record_payment_confirmed();
                if let Some(error) = rejected {
                    Self::anomaly(Some(expected), &error);
                    ReconcileOutcome::Anomaly {
                        status: Some(expected),
                    }
                } else {
                    tracing::info!(booking_id = %payment.booking_id, "Payment confirmed");
                    run_effects(effects).await;
                    ReconcileOutcome::Confirmed
                }
            },
            ConfirmOutcome::AlreadySucceeded => {
                metrics::record_duplicate_confirmation();
                tracing::info!("Payment confirmed concurrently");
                ReconcileOutcome::AlreadyConfirmed
            },
            ConfirmOutcome::BookingConflict { status } => {
                metrics::record_payment_confirmed();
                tracing::warn!(
                    booking_id = %payment.booking_id,
                    status = ?status,
                    "booking confirmation anomaly: booking changed while the payment was confirmed"
                );
                ReconcileOutcome::Anomaly { status }
            },
            ConfirmOutcome::Duplicate { paid_by } => {
                metrics::record_duplicate_charge();
                tracing::error!(
                    booking_id = %payment.booking_id,
                    paid_by = %paid_by,
                    amount = %payment.amount,
                    "Booking was already paid by another attempt, charge needs a refund"
                );
                ReconcileOutcome::DuplicateCharge { paid_by: Some(paid_by) }
            },
            ConfirmOutcome::UnknownReference => ReconcileOutcome::UnknownReference,
        };
        Ok(outcome)
    }

    async fn apply_failure(
        &self,
        payment: &Payment,
        status: TransactionStatus,
        gateway_response: Option<String>,
    ) -> Result<ReconcileOutcome> {
        let recorded = self
            .ports
            .payments
            .record_failure(PaymentFailure {
                reference: payment.reference.clone(),
                status,
                gateway_response,
            })
            .await?;
        if !recorded {
            tracing::info!(status = %status, "Payment no longer pending, failure ignored");
            return Ok(ReconcileOutcome::NotSuccessful { status });
        }
        metrics::record_payment_failed(status.as_str());
        tracing::info!(status = %status, "Payment attempt did not succeed");

        for _ in 0..WRITE_ATTEMPTS {
            // Only the booking's current attempt may mark it failed.
            let Some(booking) = self.ports.bookings.get_booking(payment.booking_id).await? else {
                break;
            };
            if booking.payment != Some(payment.id) {
                break;
            }

            let mut state = BookingState::new(booking.clone());
            BookingReducer.reduce(
                &mut state,
                BookingAction::PaymentFailed {
                    reference: payment.reference.clone(),
                },
                &self.env,
            );
            if state.booking == booking || self.ports.bookings.update_booking(state.booking, None).await? {
                break;
            }
            tracing::debug!("Booking changed before the failure was recorded on it, re-reading");
        }
        Ok(ReconcileOutcome::NotSuccessful { status })
    }

    fn anomaly(status: Option<BookingStatus>, error: &TransitionError) {
        tracing::warn!(
            status = ?status,
            error = %error,
            "booking confirmation anomaly: payment collected for a booking that cannot be confirmed"
        );
    }
}
