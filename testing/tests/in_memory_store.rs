//! Guard semantics of the in-memory store, which the service tests rely on.

#![allow(clippy::unwrap_used)]

use marketplace_core::booking::{Booking, Coupon, NewBooking};
use marketplace_core::commission::{CommissionRates, Split};
use marketplace_core::details::validate;
use marketplace_core::payment::{NewPayment, Payment, PaymentConfirmation, PaymentMetadata};
use marketplace_core::store::{
    BookingStore, BookingTransition, ConfigurationStore, ConfirmOutcome, PaymentStore,
    SettlementStore, VendorStore,
};
use marketplace_core::types::{
    BookingPaymentStatus, BookingStatus, Category, FeeBearer, Money, Percentage, TransactionStatus, UserId,
};
use marketplace_testing::InMemoryStore;
use serde_json::json;

fn booking() -> Booking {
    Booking::create(
        NewBooking {
            explorer: UserId::new(),
            vendor: UserId::new(),
            listing_id: "gala-night".into(),
            details: validate("events", &json!([{ "ticketTypeId": "vip", "quantity": 1 }])).unwrap(),
            total_amount: Money::from_minor(20_000),
            service_fee: Money::from_minor(500),
            coupon: Coupon::default(),
        },
        chrono::Utc::now(),
    )
}

fn attempt(booking: &Booking, reference: &str) -> Payment {
    Payment::open(
        NewPayment {
            booking_id: booking.id,
            vendor: booking.vendor,
            explorer: booking.explorer,
            reference: reference.into(),
            amount: booking.total_amount,
            currency: "NGN".into(),
            customer_email: "ada@example.com".into(),
            customer_name: None,
            metadata: PaymentMetadata {
                category: Category::Events,
                commission_rate: Percentage::from_bps(500).unwrap(),
                commission: Money::from_minor(1_000),
                split: false,
                subaccount_id: None,
                fee_bearer: FeeBearer::Vendor,
                access_code: None,
                gateway_transaction_id: None,
            },
        },
        chrono::Utc::now(),
    )
}

fn confirmation(reference: &str) -> PaymentConfirmation {
    PaymentConfirmation {
        reference: reference.into(),
        paid_at: chrono::Utc::now(),
        channel: Some("card".into()),
        gateway_transaction_id: Some(1),
        gateway_response: Some("Approved".into()),
        split: Split {
            vendor_amount: Money::from_minor(19_000),
            platform_amount: Money::from_minor(1_000),
            gateway_fees: Money::from_minor(300),
        },
    }
}

#[tokio::test]
async fn second_confirmation_writes_nothing() {
    let store = InMemoryStore::new();
    let booking = booking();
    store.insert_booking(booking.clone()).await.unwrap();
    assert!(store.open_attempt(attempt(&booking, "BKG-A"), booking.clone()).await.unwrap());

    let mut confirmed = booking.clone();
    confirmed.status = BookingStatus::Confirmed;
    let transition = BookingTransition {
        booking: confirmed,
        expected: BookingStatus::Pending,
    };

    let first = store
        .confirm_payment(confirmation("BKG-A"), transition.clone())
        .await
        .unwrap();
    let second = store
        .confirm_payment(confirmation("BKG-A"), transition)
        .await
        .unwrap();

    assert_eq!(first, ConfirmOutcome::Applied);
    assert_eq!(second, ConfirmOutcome::AlreadySucceeded);
    assert_eq!(store.payment("BKG-A").unwrap().status, TransactionStatus::Success);
    assert_eq!(store.booking(booking.id).unwrap().status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn confirmation_against_a_changed_booking_only_records_the_payment() {
    let store = InMemoryStore::new();
    let booking = booking();
    store.insert_booking(booking.clone()).await.unwrap();
    store.open_attempt(attempt(&booking, "BKG-B"), booking.clone()).await.unwrap();

    let mut cancelled = store.booking(booking.id).unwrap();
    cancelled.status = BookingStatus::Cancelled;
    store.put_booking(cancelled);

    let mut confirmed = booking.clone();
    confirmed.status = BookingStatus::Confirmed;
    let outcome = store
        .confirm_payment(
            confirmation("BKG-B"),
            BookingTransition {
                booking: confirmed,
                expected: BookingStatus::Pending,
            },
        )
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ConfirmOutcome::BookingConflict {
            status: Some(BookingStatus::Cancelled)
        }
    );
    let stored = store.booking(booking.id).unwrap();
    assert_eq!(stored.status, BookingStatus::Cancelled);
    assert_eq!(stored.payment_reference.as_deref(), Some("BKG-B"));
}

#[tokio::test]
async fn a_booking_holds_at_most_one_successful_attempt() {
    let store = InMemoryStore::new();
    let booking = booking();
    store.insert_booking(booking.clone()).await.unwrap();
    assert!(store.open_attempt(attempt(&booking, "BKG-C1"), booking.clone()).await.unwrap());
    assert!(store.open_attempt(attempt(&booking, "BKG-C2"), booking.clone()).await.unwrap());

    let mut confirmed = booking.clone();
    confirmed.status = BookingStatus::Confirmed;
    let transition = BookingTransition {
        booking: confirmed,
        expected: BookingStatus::Pending,
    };
    let first = store
        .confirm_payment(confirmation("BKG-C1"), transition.clone())
        .await
        .unwrap();
    let second = store
        .confirm_payment(confirmation("BKG-C2"), transition)
        .await
        .unwrap();

    assert_eq!(first, ConfirmOutcome::Applied);
    assert_eq!(
        second,
        ConfirmOutcome::Duplicate {
            paid_by: "BKG-C1".into()
        }
    );
    let duplicate = store.payment("BKG-C2").unwrap();
    assert_eq!(duplicate.status, TransactionStatus::Duplicate);
    assert_eq!(duplicate.vendor_amount, Money::ZERO);
    assert_eq!(duplicate.platform_amount, Money::ZERO);

    let summary = store.settlement_summary(Some(booking.vendor)).await.unwrap();
    assert_eq!(summary.pending_payments, 1);
    assert_eq!(summary.pending_payout, Money::from_minor(19_000));
    assert_eq!(
        store.booking(booking.id).unwrap().payment,
        Some(store.payment("BKG-C1").unwrap().id)
    );
}

#[tokio::test]
async fn stale_booking_copies_are_not_written() {
    let store = InMemoryStore::new();
    let booking = booking();
    store.insert_booking(booking.clone()).await.unwrap();
    assert!(store.open_attempt(attempt(&booking, "BKG-S1"), booking.clone()).await.unwrap());

    let mut stale = store.booking(booking.id).unwrap();
    let newer = attempt(&booking, "BKG-S2");
    let newer_id = newer.id;
    assert!(store.open_attempt(newer, booking.clone()).await.unwrap());

    stale.payment_status = BookingPaymentStatus::Failed;
    assert!(!store.update_booking(stale, None).await.unwrap());

    let stored = store.booking(booking.id).unwrap();
    assert_eq!(stored.payment, Some(newer_id));
    assert_eq!(stored.payment_status, BookingPaymentStatus::Pending);

    let mut fresh = stored.clone();
    fresh.payment_status = BookingPaymentStatus::Failed;
    assert!(store.update_booking(fresh, None).await.unwrap());
    assert_eq!(store.booking(booking.id).unwrap().version, stored.version + 1);
}

#[tokio::test]
async fn activation_bumps_the_version_and_keeps_one_active() {
    let store = InMemoryStore::new();
    let first = store.seed_configuration(CommissionRates::default());
    let second = store
        .activate_configuration(CommissionRates::default(), UserId::new(), chrono::Utc::now())
        .await
        .unwrap();

    assert_eq!(second.version, first.version + 1);
    assert_eq!(store.active_configuration().await.unwrap().unwrap().id, second.id);
    assert_eq!(store.configuration_versions(), 2);
}

#[tokio::test]
async fn only_one_subaccount_reservation_wins() {
    let store = InMemoryStore::new();
    let vendor = UserId::new();

    assert!(store.reserve_subaccount(vendor, Some(Category::Leisure)).await.unwrap());
    assert!(!store.reserve_subaccount(vendor, Some(Category::Leisure)).await.unwrap());

    store.release_subaccount(vendor).await.unwrap();
    assert!(store.reserve_subaccount(vendor, None).await.unwrap());
    assert_eq!(
        store.vendor(vendor).unwrap().vendor_account_preference,
        Some(Category::Leisure)
    );
}
