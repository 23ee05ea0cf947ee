//! Checkout: opening payment attempts and reading them back.

use super::reconciler::{ReconcileOutcome, Reconciler};
use super::{Collaborators, PaymentPolicy, page_size};
use crate::auth::SessionUser;
use crate::metrics;
use marketplace_core::booking::{Booking, BookingAction, BookingEnvironment, BookingReducer, BookingState};
use marketplace_core::commission::CommissionResolver;
use marketplace_core::error::{MarketplaceError, Result, TransitionError, ValidationError};
use marketplace_core::gateway::{InitializeRequest, InitializedTransaction, SplitInstruction};
use marketplace_core::payment::{NewPayment, Payment, PaymentFailure, PaymentMetadata, new_reference};
use marketplace_core::reducer::Reducer;
use marketplace_core::store::PaymentFilter;
use marketplace_core::types::{BookingId, BookingPaymentStatus, FeeBearer, PaymentId, Role, TransactionStatus};
use serde_json::json;

/// Query for listing payment attempts
#[derive(Clone, Debug, Default)]
pub struct PaymentQuery {
    /// Only attempts for this booking
    pub booking_id: Option<BookingId>,
    /// Only attempts in this status
    pub status: Option<TransactionStatus>,
    /// Page size
    pub limit: Option<u32>,
    /// Rows to skip
    pub offset: Option<u32>,
}

/// Opens payment attempts at the gateway
#[derive(Clone)]
pub struct CheckoutService {
    ports: Collaborators,
    policy: PaymentPolicy,
    resolver: CommissionResolver,
    reconciler: Reconciler,
    env: BookingEnvironment,
}

impl CheckoutService {
    /// Creates the service
    #[must_use]
    pub fn new(ports: Collaborators, policy: PaymentPolicy) -> Self {
        let resolver = CommissionResolver::new(ports.configurations.clone());
        let env = BookingEnvironment::new(ports.clock.clone(), ports.notifier.clone());
        let reconciler = Reconciler::new(ports.clone());
        Self {
            ports,
            policy,
            resolver,
            reconciler,
            env,
        }
    }

    /// Opens a checkout for a pending booking owned by the caller.
    ///
    /// The commission rate and split routing are snapshotted on the attempt,
    /// so later configuration changes never alter it. Nothing is recorded
    /// when the gateway refuses the checkout. Attempts still pending for the
    /// booking are verified first: one that went through pays the booking,
    /// the others are closed as `abandoned`.
    ///
    /// # Errors
    ///
    /// - `FORBIDDEN` unless the caller is the booking's explorer
    /// - `ALREADY_PROCESSED` when the booking is already paid
    /// - `INVALID_STATUS` unless the booking is pending
    /// - `CONFIG_MISSING` without an active configuration
    /// - `GATEWAY_ERROR` when the gateway refuses or is unreachable
    #[tracing::instrument(skip_all, fields(booking_id = %booking_id, user_id = %session.user_id))]
    pub async fn initialize(&self, session: &SessionUser, booking_id: BookingId) -> Result<InitializedTransaction> {
        session.require(Role::Explorer)?;
        let mut booking = self.load(booking_id).await?;
        if booking.explorer != session.user_id {
            return Err(MarketplaceError::Forbidden(
                "only the explorer who made the booking can pay for it".to_string(),
            ));
        }
        if self.close_open_attempts(booking_id).await? {
            booking = self.load(booking_id).await?;
        }
        if booking.payment_status == BookingPaymentStatus::Paid {
            return Err(TransitionError::AlreadyPaid.into());
        }

        let payment_id = PaymentId::new();
        let mut state = BookingState::new(booking);
        BookingReducer.reduce(&mut state, BookingAction::AttachPayment { payment_id }, &self.env);
        if let Some(error) = state.last_error.take() {
            return Err(error.into());
        }
        let booking = state.booking;

        let amount = booking.total_amount;
        if !amount.is_positive() {
            return Err(ValidationError::field("totalAmount", "booking has nothing to pay").into());
        }
        let email = session
            .email
            .clone()
            .ok_or_else(|| ValidationError::field("email", "a payer email is required"))?;

        let vendor = self.ports.vendors.get_vendor(booking.vendor).await?;
        let rate = self
            .resolver
            .resolve(vendor.as_ref().and_then(|v| v.commission_rate), booking.category)
            .await?;
        let commission = rate.of(amount);

        let split = vendor
            .as_ref()
            .and_then(|v| v.active_subaccount())
            .map(|subaccount| SplitInstruction {
                subaccount_id: subaccount.subaccount_id.clone(),
                transaction_charge: commission,
                bearer: self.policy.fee_bearer,
            });
        let mut metadata = PaymentMetadata {
            category: booking.category,
            commission_rate: rate,
            commission,
            split: split.is_some(),
            subaccount_id: split.as_ref().map(|s| s.subaccount_id.clone()),
            fee_bearer: if split.is_some() {
                self.policy.fee_bearer
            } else {
                FeeBearer::Platform
            },
            access_code: None,
            gateway_transaction_id: None,
        };

        let reference = new_reference();
        let opened = self
            .ports
            .gateway
            .initialize(InitializeRequest {
                reference: reference.clone(),
                amount,
                currency: self.policy.currency.clone(),
                email: email.clone(),
                metadata: json!({
                    "bookingId": booking.id,
                    "bookingCode": booking.code,
                    "category": booking.category,
                    "commissionRate": rate.as_percent(),
                }),
                split: split.clone(),
                callback_url: self.policy.callback_url.clone(),
            })
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Gateway refused checkout");
                MarketplaceError::Gateway(e)
            })?;
        metadata.access_code = Some(opened.access_code.clone());

        let mut payment = Payment::open(
            NewPayment {
                booking_id: booking.id,
                vendor: booking.vendor,
                explorer: booking.explorer,
                reference,
                amount,
                currency: self.policy.currency.clone(),
                customer_email: email,
                customer_name: session.name.clone(),
                metadata,
            },
            self.ports.clock.now(),
        );
        payment.id = payment_id;

        if !self.ports.payments.open_attempt(payment, booking.clone()).await? {
            return Err(self.attempt_conflict(booking_id).await);
        }

        metrics::record_payment_initialized(split.is_some());
        tracing::info!(
            reference = %opened.reference,
            amount = %amount,
            commission = %commission,
            split = split.is_some(),
            "Checkout opened"
        );
        Ok(opened)
    }

    async fn load(&self, booking_id: BookingId) -> Result<Booking> {
        self.ports
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| MarketplaceError::not_found("booking", booking_id))
    }

    /// Verifies every attempt still pending for the booking. Charges that
    /// went through are confirmed; attempts the gateway still reports in
    /// flight, or cannot verify, are closed as `abandoned` so that only the
    /// new attempt can pay the booking. Returns whether any attempt was
    /// touched.
    async fn close_open_attempts(&self, booking_id: BookingId) -> Result<bool> {
        let open = self
            .ports
            .payments
            .list_payments(PaymentFilter {
                booking_id: Some(booking_id),
                status: Some(TransactionStatus::Pending),
                ..PaymentFilter::default()
            })
            .await?;

        for attempt in &open {
            let superseded = match self.reconciler.reconcile(&attempt.reference).await {
                Ok(report) => matches!(report.outcome, ReconcileOutcome::InFlight { .. }),
                Err(MarketplaceError::Gateway(e)) => {
                    tracing::warn!(reference = %attempt.reference, error = %e, "Earlier attempt could not be verified");
                    true
                },
                Err(e) => return Err(e),
            };
            if superseded {
                self.supersede(attempt).await?;
            }
        }
        Ok(!open.is_empty())
    }

    async fn supersede(&self, attempt: &Payment) -> Result<()> {
        let closed = self
            .ports
            .payments
            .record_failure(PaymentFailure {
                reference: attempt.reference.clone(),
                status: TransactionStatus::Abandoned,
                gateway_response: Some("superseded by a new checkout".to_string()),
            })
            .await?;
        if closed {
            metrics::record_payment_failed(TransactionStatus::Abandoned.as_str());
            tracing::info!(reference = %attempt.reference, "Earlier attempt superseded");
        }
        Ok(())
    }

    /// Error for a booking that changed between the read and the guarded write
    async fn attempt_conflict(&self, booking_id: BookingId) -> MarketplaceError {
        match self.ports.bookings.get_booking(booking_id).await {
            Ok(Some(current)) if current.payment_status == BookingPaymentStatus::Paid => TransitionError::AlreadyPaid.into(),
            Ok(Some(current)) => TransitionError::InvalidStatus {
                action: "pay for",
                status: current.status,
            }
            .into(),
            Ok(None) => MarketplaceError::not_found("booking", booking_id),
            Err(e) => e.into(),
        }
    }

    /// Loads an attempt the caller may see.
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` for unknown references, `FORBIDDEN` for other users'
    /// attempts.
    pub async fn payment(&self, session: &SessionUser, reference: &str) -> Result<Payment> {
        let payment = self
            .ports
            .payments
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| MarketplaceError::not_found("payment", reference))?;
        let visible = match session.role {
            Role::Admin => true,
            Role::Vendor => payment.vendor == session.user_id,
            Role::Explorer => payment.explorer == session.user_id,
        };
        if !visible {
            return Err(MarketplaceError::Forbidden("payment belongs to another user".to_string()));
        }
        Ok(payment)
    }

    /// Lists attempts scoped to the caller: explorers see what they paid,
    /// vendors what they were paid, admins everything.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn list(&self, session: &SessionUser, query: PaymentQuery) -> Result<Vec<Payment>> {
        let mut filter = PaymentFilter {
            booking_id: query.booking_id,
            status: query.status,
            limit: page_size(query.limit),
            offset: query.offset.unwrap_or(0),
            ..PaymentFilter::default()
        };
        match session.role {
            Role::Explorer => filter.explorer = Some(session.user_id),
            Role::Vendor => filter.vendor = Some(session.user_id),
            Role::Admin => {},
        }
        Ok(self.ports.payments.list_payments(filter).await?)
    }
}
