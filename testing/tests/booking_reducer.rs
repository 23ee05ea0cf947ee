//! Given/When/Then coverage of the booking state machine.

#![allow(clippy::unwrap_used, clippy::panic)]

use marketplace_core::booking::{
    Booking, BookingAction, BookingEnvironment, BookingReducer, BookingState, Coupon, NewBooking,
};
use marketplace_core::details::validate;
use marketplace_core::effect::Effect;
use marketplace_core::environment::Clock;
use marketplace_core::reducer::Reducer;
use marketplace_core::types::{
    ApprovalStatus, BookingPaymentStatus, BookingStatus, Money, PaymentId, Role, UserId,
};
use marketplace_testing::{RecordingNotifier, ReducerTest, assertions, test_clock};
use serde_json::json;
use std::sync::Arc;

fn env() -> BookingEnvironment {
    BookingEnvironment::new(Arc::new(test_clock()), Arc::new(RecordingNotifier::new()))
}

fn stay_request(vendor: UserId) -> Booking {
    let details = validate(
        "accommodations",
        &json!({ "checkInDate": "2025-03-10", "checkOutDate": "2025-03-12", "guests": 2 }),
    )
    .unwrap();
    Booking::create(
        NewBooking {
            explorer: UserId::new(),
            vendor,
            listing_id: "lagoon-cabin".into(),
            details,
            total_amount: Money::from_minor(80_000),
            service_fee: Money::from_minor(2_000),
            coupon: Coupon::default(),
        },
        test_clock().now(),
    )
}

fn cinema_booking(vendor: UserId) -> Booking {
    let details = validate(
        "movies_and_cinema",
        &json!({ "showtime": "st-20h", "tickets": [{ "ticketTypeId": "std", "quantity": 2 }] }),
    )
    .unwrap();
    Booking::create(
        NewBooking {
            explorer: UserId::new(),
            vendor,
            listing_id: "screen-3".into(),
            details,
            total_amount: Money::from_minor(6_000),
            service_fee: Money::ZERO,
            coupon: Coupon::default(),
        },
        test_clock().now(),
    )
}

fn error_code(state: &BookingState) -> Option<&'static str> {
    state.last_error.as_ref().map(|e| e.code())
}

fn paid(mut booking: Booking, reference: &str) -> Booking {
    booking.status = BookingStatus::Confirmed;
    booking.payment_status = BookingPaymentStatus::Paid;
    booking.payment_reference = Some(reference.into());
    booking
}

// ============================================================================
// Vendor decisions
// ============================================================================

#[test]
fn approving_a_request_makes_it_payable() {
    let vendor = UserId::new();
    ReducerTest::new(BookingReducer)
        .with_env(env())
        .given_state(BookingState::new(stay_request(vendor)))
        .when_action(BookingAction::Approve {
            actor: vendor,
            message: Some("Welcome".into()),
        })
        .then_state(|state| {
            assert_eq!(state.booking.status, BookingStatus::Pending);
            let approval = state.booking.vendor_approval.as_ref().unwrap();
            assert_eq!(approval.status, ApprovalStatus::Approved);
            assert_eq!(approval.message.as_deref(), Some("Welcome"));
            assert!(approval.approved_at.is_some());
            assert!(state.last_error.is_none());
        })
        .then_effects(|effects| {
            assertions::assert_effects_count(effects, 1);
            assertions::assert_has_future_effect(effects);
        })
        .run();
}

#[test]
fn rejecting_a_request_cancels_it() {
    let vendor = UserId::new();
    ReducerTest::new(BookingReducer)
        .with_env(env())
        .given_state(BookingState::new(stay_request(vendor)))
        .when_action(BookingAction::Reject { actor: vendor, message: None })
        .then_state(|state| {
            assert_eq!(state.booking.status, BookingStatus::Cancelled);
            let approval = state.booking.vendor_approval.as_ref().unwrap();
            assert_eq!(approval.status, ApprovalStatus::Rejected);
            assert!(approval.rejected_at.is_some());
        })
        .then_effects(|effects| assertions::assert_effects_count(effects, 1))
        .run();
}

#[test]
fn a_decision_cannot_be_taken_twice() {
    let vendor = UserId::new();
    let mut rejected = BookingState::new(stay_request(vendor));
    BookingReducer.reduce(&mut rejected, BookingAction::Reject { actor: vendor, message: None }, &env());

    ReducerTest::new(BookingReducer)
        .with_env(env())
        .given_state(BookingState::new(rejected.booking))
        .when_action(BookingAction::Approve { actor: vendor, message: None })
        .then_state(|state| {
            assertions::assert_rejected_with(error_code(state), "ALREADY_PROCESSED");
            assert_eq!(state.booking.status, BookingStatus::Cancelled);
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn only_the_listing_vendor_decides() {
    let booking = stay_request(UserId::new());
    let before = booking.clone();
    ReducerTest::new(BookingReducer)
        .with_env(env())
        .given_state(BookingState::new(booking))
        .when_action(BookingAction::Approve {
            actor: UserId::new(),
            message: None,
        })
        .then_state(move |state| {
            assertions::assert_rejected_with(error_code(state), "FORBIDDEN");
            assert_eq!(state.booking, before);
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

// ============================================================================
// Payment lifecycle
// ============================================================================

#[test]
fn requests_cannot_take_payment_before_approval() {
    ReducerTest::new(BookingReducer)
        .with_env(env())
        .given_state(BookingState::new(stay_request(UserId::new())))
        .when_action(BookingAction::AttachPayment {
            payment_id: PaymentId::new(),
        })
        .then_state(|state| {
            assertions::assert_rejected_with(error_code(state), "INVALID_STATUS");
            assert!(state.booking.payment.is_none());
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn attaching_a_payment_marks_it_pending() {
    let payment_id = PaymentId::new();
    ReducerTest::new(BookingReducer)
        .with_env(env())
        .given_state(BookingState::new(cinema_booking(UserId::new())))
        .when_action(BookingAction::AttachPayment { payment_id })
        .then_state(move |state| {
            assert!(state.last_error.is_none());
            assert_eq!(state.booking.payment, Some(payment_id));
            assert_eq!(state.booking.payment_status, BookingPaymentStatus::Pending);
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn a_paid_booking_refuses_new_attempts() {
    let mut booking = cinema_booking(UserId::new());
    booking.payment_status = BookingPaymentStatus::Paid;
    ReducerTest::new(BookingReducer)
        .with_env(env())
        .given_state(BookingState::new(booking))
        .when_action(BookingAction::AttachPayment {
            payment_id: PaymentId::new(),
        })
        .then_state(|state| {
            assertions::assert_rejected_with(error_code(state), "ALREADY_PROCESSED");
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn confirming_the_same_reference_again_is_silent() {
    ReducerTest::new(BookingReducer)
        .with_env(env())
        .given_state(BookingState::new(paid(cinema_booking(UserId::new()), "MOV-REF-1")))
        .when_action(BookingAction::ConfirmPayment {
            reference: "MOV-REF-1".into(),
            amount: Money::from_minor(6_000),
        })
        .then_state(|state| {
            assert!(state.last_error.is_none());
            assert_eq!(state.booking.status, BookingStatus::Confirmed);
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn a_second_reference_cannot_confirm_a_confirmed_booking() {
    ReducerTest::new(BookingReducer)
        .with_env(env())
        .given_state(BookingState::new(paid(cinema_booking(UserId::new()), "MOV-REF-1")))
        .when_action(BookingAction::ConfirmPayment {
            reference: "MOV-REF-2".into(),
            amount: Money::from_minor(6_000),
        })
        .then_state(|state| {
            assertions::assert_rejected_with(error_code(state), "INVALID_STATUS");
            assert_eq!(state.booking.payment_reference.as_deref(), Some("MOV-REF-1"));
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn money_on_a_cancelled_booking_is_recorded_without_reviving_it() {
    let mut booking = cinema_booking(UserId::new());
    booking.status = BookingStatus::Cancelled;
    ReducerTest::new(BookingReducer)
        .with_env(env())
        .given_state(BookingState::new(booking))
        .when_action(BookingAction::ConfirmPayment {
            reference: "MOV-LATE".into(),
            amount: Money::from_minor(6_000),
        })
        .then_state(|state| {
            assertions::assert_rejected_with(error_code(state), "INVALID_STATUS");
            assert_eq!(state.booking.status, BookingStatus::Cancelled);
            assert_eq!(state.booking.payment_status, BookingPaymentStatus::Paid);
            assert_eq!(state.booking.payment_reference.as_deref(), Some("MOV-LATE"));
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn a_failed_charge_keeps_the_booking_payable() {
    ReducerTest::new(BookingReducer)
        .with_env(env())
        .given_state(BookingState::new(cinema_booking(UserId::new())))
        .when_action(BookingAction::PaymentFailed {
            reference: "MOV-DECLINED".into(),
        })
        .then_state(|state| {
            assert_eq!(state.booking.status, BookingStatus::Pending);
            assert_eq!(state.booking.payment_status, BookingPaymentStatus::Failed);
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn a_late_failure_does_not_undo_a_payment() {
    ReducerTest::new(BookingReducer)
        .with_env(env())
        .given_state(BookingState::new(paid(cinema_booking(UserId::new()), "MOV-REF-1")))
        .when_action(BookingAction::PaymentFailed {
            reference: "MOV-OLD".into(),
        })
        .then_state(|state| {
            assert_eq!(state.booking.status, BookingStatus::Confirmed);
            assert_eq!(state.booking.payment_status, BookingPaymentStatus::Paid);
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

// ============================================================================
// Overrides
// ============================================================================

#[test]
fn explorers_cannot_override() {
    let booking = cinema_booking(UserId::new());
    let explorer = booking.explorer;
    ReducerTest::new(BookingReducer)
        .with_env(env())
        .given_state(BookingState::new(booking))
        .when_action(BookingAction::OverrideStatus {
            actor: explorer,
            role: Role::Explorer,
            status: BookingStatus::Cancelled,
            reason: "changed my mind".into(),
        })
        .then_state(|state| {
            assertions::assert_rejected_with(error_code(state), "FORBIDDEN");
            assert_eq!(state.booking.status, BookingStatus::Pending);
            assert!(state.audit.is_none());
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn vendors_override_only_their_own_bookings() {
    ReducerTest::new(BookingReducer)
        .with_env(env())
        .given_state(BookingState::new(cinema_booking(UserId::new())))
        .when_action(BookingAction::OverrideStatus {
            actor: UserId::new(),
            role: Role::Vendor,
            status: BookingStatus::Cancelled,
            reason: "screen closed".into(),
        })
        .then_state(|state| {
            assertions::assert_rejected_with(error_code(state), "FORBIDDEN");
        })
        .run();
}

#[test]
fn an_override_needs_a_reason() {
    ReducerTest::new(BookingReducer)
        .with_env(env())
        .given_state(BookingState::new(cinema_booking(UserId::new())))
        .when_action(BookingAction::OverrideStatus {
            actor: UserId::new(),
            role: Role::Admin,
            status: BookingStatus::Cancelled,
            reason: "   ".into(),
        })
        .then_state(|state| {
            assertions::assert_rejected_with(error_code(state), "VALIDATION_ERROR");
            assert_eq!(state.booking.status, BookingStatus::Pending);
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn overriding_to_the_current_status_is_refused() {
    ReducerTest::new(BookingReducer)
        .with_env(env())
        .given_state(BookingState::new(cinema_booking(UserId::new())))
        .when_action(BookingAction::OverrideStatus {
            actor: UserId::new(),
            role: Role::Admin,
            status: BookingStatus::Pending,
            reason: "no-op".into(),
        })
        .then_state(|state| {
            assertions::assert_rejected_with(error_code(state), "INVALID_STATUS");
        })
        .then_effects(assertions::assert_no_effects)
        .run();
}

#[test]
fn an_admin_override_is_audited() {
    let admin = UserId::new();
    let booking = cinema_booking(UserId::new());
    let booking_id = booking.id;
    ReducerTest::new(BookingReducer)
        .with_env(env())
        .given_state(BookingState::new(booking))
        .when_action(BookingAction::OverrideStatus {
            actor: admin,
            role: Role::Admin,
            status: BookingStatus::Failed,
            reason: "chargeback from issuer".into(),
        })
        .then_state(move |state| {
            assert!(state.last_error.is_none());
            assert_eq!(state.booking.status, BookingStatus::Failed);
            let audit = state.audit.as_ref().unwrap();
            assert_eq!(audit.booking_id, booking_id);
            assert_eq!(audit.from, BookingStatus::Pending);
            assert_eq!(audit.to, BookingStatus::Failed);
            assert_eq!(audit.actor, admin);
            assert_eq!(audit.role, Role::Admin);
            assert_eq!(audit.reason, "chargeback from issuer");
        })
        .then_effects(|effects| {
            assertions::assert_effects_count(effects, 1);
            assertions::assert_has_future_effect(effects);
        })
        .run();
}

// ============================================================================
// Effects
// ============================================================================

#[tokio::test]
async fn the_approval_effect_reaches_the_notifier() {
    let notifier = Arc::new(RecordingNotifier::new());
    let env = BookingEnvironment::new(Arc::new(test_clock()), notifier.clone());
    let vendor = UserId::new();
    let mut state = BookingState::new(stay_request(vendor));

    let mut effects = BookingReducer.reduce(
        &mut state,
        BookingAction::Approve { actor: vendor, message: None },
        &env,
    );
    let Some(Effect::Future(delivery)) = effects.pop() else {
        panic!("expected a notification effect");
    };

    assert!(delivery.await.is_none());
    assert_eq!(notifier.sent_of_kind("booking_approved").len(), 1);
}

#[tokio::test]
async fn undelivered_notifications_come_back_as_actions() {
    let notifier = Arc::new(RecordingNotifier::new());
    notifier.fail_deliveries();
    let env = BookingEnvironment::new(Arc::new(test_clock()), notifier.clone());
    let mut state = BookingState::new(cinema_booking(UserId::new()));

    let mut effects = BookingReducer.reduce(
        &mut state,
        BookingAction::ConfirmPayment {
            reference: "MOV-REF-9".into(),
            amount: Money::from_minor(6_000),
        },
        &env,
    );
    let Some(Effect::Future(delivery)) = effects.pop() else {
        panic!("expected a notification effect");
    };

    let feedback = delivery.await;
    assert!(matches!(
        feedback,
        Some(BookingAction::NotificationFailed { kind: "payment_confirmed", .. })
    ));
    assert!(notifier.sent().is_empty());

    // Feedback actions leave the booking untouched
    let before = state.booking.clone();
    let effects = BookingReducer.reduce(&mut state, feedback.unwrap(), &env);
    assert!(effects.is_empty());
    assert_eq!(state.booking, before);
}
