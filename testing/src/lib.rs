//! # Marketplace Testing
//!
//! Test doubles and helpers for the booking marketplace.
//!
//! This crate provides:
//! - [`FixedClock`] and [`test_clock`] for deterministic time
//! - [`InMemoryStore`], implementing every persistence port
//! - [`MockGateway`], a scripted payment gateway
//! - [`RecordingNotifier`] and [`StaticListings`]
//! - [`ReducerTest`], a Given-When-Then harness for reducers
//! - [`properties`], proptest strategies for domain values
//!
//! ## Example
//!
//! ```ignore
//! use marketplace_testing::{InMemoryStore, MockGateway, RecordingNotifier};
//!
//! #[tokio::test]
//! async fn confirms_once() {
//!     let store = InMemoryStore::new();
//!     let gateway = MockGateway::new();
//!     let notifier = RecordingNotifier::new();
//!     // wire services over the doubles ...
//! }
//! ```

use chrono::{DateTime, Utc};
use marketplace_core::environment::Clock;

pub mod gateway_mock;
pub mod reducer_test;
pub mod store_mocks;

/// Mock implementations of collaborator traits
pub mod mocks {
    #![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
    #![allow(clippy::missing_panics_doc)]

    use super::{Clock, DateTime, Utc};
    use marketplace_core::BoxFuture;
    use marketplace_core::error::StoreError;
    use marketplace_core::listing::{ListingDirectory, ListingRef};
    use marketplace_core::notify::{Notification, Notifier, NotifyError};
    use marketplace_core::types::{Category, UserId};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use marketplace_testing::mocks::FixedClock;
    /// use marketplace_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Notifier that records deliveries, and can be told to fail them
    #[derive(Clone, Debug, Default)]
    pub struct RecordingNotifier {
        sent: Arc<Mutex<Vec<Notification>>>,
        failing: Arc<AtomicBool>,
    }

    impl RecordingNotifier {
        /// Create a notifier that accepts everything
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Reject every delivery from now on
        pub fn fail_deliveries(&self) {
            self.failing.store(true, Ordering::SeqCst);
        }

        /// Notifications delivered so far
        #[must_use]
        pub fn sent(&self) -> Vec<Notification> {
            self.sent.lock().unwrap().clone()
        }

        /// Delivered notifications of one kind
        #[must_use]
        pub fn sent_of_kind(&self, kind: &str) -> Vec<Notification> {
            self.sent()
                .into_iter()
                .filter(|n| n.kind() == kind)
                .collect()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notification: Notification) -> BoxFuture<'_, Result<(), NotifyError>> {
            Box::pin(async move {
                if self.failing.load(Ordering::SeqCst) {
                    return Err(NotifyError("mailbox unavailable".into()));
                }
                self.sent.lock().unwrap().push(notification);
                Ok(())
            })
        }
    }

    /// Fixed listing catalog
    #[derive(Clone, Debug, Default)]
    pub struct StaticListings {
        listings: Arc<Mutex<HashMap<(Category, String), ListingRef>>>,
    }

    impl StaticListings {
        /// Create an empty catalog
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a listing owned by `vendor`
        pub fn add(&self, category: Category, listing_id: &str, vendor: UserId) {
            self.listings.lock().unwrap().insert(
                (category, listing_id.to_string()),
                ListingRef {
                    listing_id: listing_id.to_string(),
                    category,
                    vendor,
                },
            );
        }
    }

    impl ListingDirectory for StaticListings {
        fn find_listing<'a>(
            &'a self,
            category: Category,
            listing_id: &'a str,
        ) -> BoxFuture<'a, Result<Option<ListingRef>, StoreError>> {
            Box::pin(async move {
                Ok(self
                    .listings
                    .lock()
                    .unwrap()
                    .get(&(category, listing_id.to_string()))
                    .cloned())
            })
        }
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use marketplace_core::types::{Category, Money, Percentage};
    use proptest::prelude::*;

    /// Any marketplace vertical
    pub fn category() -> impl Strategy<Value = Category> {
        prop::sample::select(Category::ALL.to_vec())
    }

    /// Positive amounts up to ten million major units
    pub fn amount() -> impl Strategy<Value = Money> {
        (1i64..1_000_000_000).prop_map(Money::from_minor)
    }

    /// Any valid commission rate
    pub fn rate() -> impl Strategy<Value = Percentage> {
        (0u32..=Percentage::MAX_BPS).prop_filter_map("valid rate", |bps| Percentage::from_bps(bps).ok())
    }
}

// Re-export commonly used items
pub use gateway_mock::{MockGateway, successful_charge, unsuccessful_charge};
pub use mocks::{FixedClock, RecordingNotifier, StaticListings, test_clock};
pub use reducer_test::{ReducerTest, assertions};
pub use store_mocks::{InMemoryStore, active_subaccount};
