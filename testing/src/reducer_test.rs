//! Ergonomic testing utilities for reducers
//!
//! This module provides a fluent API for testing reducers with readable Given-When-Then syntax.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use marketplace_core::{effect::Effect, reducer::Reducer};

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for effect assertion functions
type EffectAssertion<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// # Example
///
/// ```ignore
/// use marketplace_testing::ReducerTest;
///
/// ReducerTest::new(BookingReducer)
///     .with_env(booking_env())
///     .given_state(BookingState::new(requested_stay))
///     .when_action(BookingAction::Approve { actor: vendor, message: None })
///     .then_state(|state| {
///         assert_eq!(state.booking.status, BookingStatus::Pending);
///     })
///     .then_effects(assertions::assert_has_future_effect)
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    action: Option<A>,
    state_assertions: Vec<StateAssertion<S>>,
    effect_assertions: Vec<EffectAssertion<A>>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
    S: Clone,
    A: Clone,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            action: None,
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Set the action to test (When)
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.action = Some(action);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the resulting effects (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if initial state, action, or environment is not set,
    /// or if any assertions fail.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        let action = self.action.expect("Action must be set with when_action()");

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        // Execute reducer
        let effects = self.reducer.reduce(&mut state, action, &env);

        // Run state assertions
        for assertion in self.state_assertions {
            assertion(&state);
        }

        // Run effect assertions
        for assertion in self.effect_assertions {
            assertion(&effects);
        }
    }
}

/// Helper assertions for effects
pub mod assertions {
    use marketplace_core::effect::Effect;

    /// Assert that there are no effects
    ///
    /// # Panics
    ///
    /// Panics if effects is not empty.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.is_empty() || matches!(effects, [Effect::None]),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert the number of effects
    ///
    /// # Panics
    ///
    /// Panics if the number of effects doesn't match expected.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "Expected {} effects, but found {}",
            expected,
            effects.len()
        );
    }

    /// Assert that effects contain at least one Future effect
    ///
    /// # Panics
    ///
    /// Panics if no Future effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_future_effect<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().any(|e| matches!(e, Effect::Future(_))),
            "Expected at least one Future effect, but none found"
        );
    }

    /// Assert that the reducer rejected the action with the given error code
    ///
    /// # Panics
    ///
    /// Panics if `code` is `None` or differs from `expected`.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_rejected_with(code: Option<&str>, expected: &str) {
        assert_eq!(
            code,
            Some(expected),
            "Expected the action to be rejected with {expected}"
        );
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::mocks::{RecordingNotifier, test_clock};
    use marketplace_core::booking::{
        Booking, BookingAction, BookingEnvironment, BookingReducer, BookingState, Coupon, NewBooking,
    };
    use marketplace_core::details::validate;
    use marketplace_core::environment::Clock;
    use marketplace_core::types::{BookingStatus, Money, UserId};
    use serde_json::json;
    use std::sync::Arc;

    fn env() -> BookingEnvironment {
        BookingEnvironment::new(Arc::new(test_clock()), Arc::new(RecordingNotifier::new()))
    }

    fn leisure_booking(vendor: UserId) -> Booking {
        Booking::create(
            NewBooking {
                explorer: UserId::new(),
                vendor,
                listing_id: "kayak-tour".into(),
                details: validate("leisure", &json!([{ "ticketTypeId": "adult", "quantity": 2 }])).unwrap(),
                total_amount: Money::from_minor(10_000),
                service_fee: Money::ZERO,
                coupon: Coupon::default(),
            },
            test_clock().now(),
        )
    }

    #[test]
    fn confirming_a_pending_booking_notifies() {
        ReducerTest::new(BookingReducer)
            .with_env(env())
            .given_state(BookingState::new(leisure_booking(UserId::new())))
            .when_action(BookingAction::ConfirmPayment {
                reference: "BKG-1".into(),
                amount: Money::from_minor(10_000),
            })
            .then_state(|state| {
                assert_eq!(state.booking.status, BookingStatus::Confirmed);
                assert!(state.last_error.is_none());
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_future_effect(effects);
            })
            .run();
    }

    #[test]
    fn approving_a_non_request_is_rejected() {
        let vendor = UserId::new();
        ReducerTest::new(BookingReducer)
            .with_env(env())
            .given_state(BookingState::new(leisure_booking(vendor)))
            .when_action(BookingAction::Approve { actor: vendor, message: None })
            .then_state(|state| {
                assertions::assert_rejected_with(
                    state.last_error.as_ref().map(|e| e.code()),
                    "INVALID_STATUS",
                );
                assert_eq!(state.booking.status, BookingStatus::Pending);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_assertions_no_effects() {
        assertions::assert_no_effects::<BookingAction>(&[Effect::None]);
        assertions::assert_no_effects::<BookingAction>(&[]);
    }
}
