//! Effect execution.
//!
//! Reducers return effects as values; they run here only after the state
//! change they belong to has been committed. Feedback actions are not fed
//! back into a store: the only one the booking reducer emits is a failed
//! notification, which is logged and counted.

use crate::metrics;
use marketplace_core::booking::BookingAction;
use marketplace_core::effect::Effect;
use smallvec::SmallVec;

/// Runs committed effects in order.
pub async fn run_effects(effects: SmallVec<[Effect<BookingAction>; 4]>) {
    for effect in effects {
        execute(effect).await;
    }
}

async fn execute(effect: Effect<BookingAction>) {
    match effect {
        Effect::None => {},
        Effect::Future(future) => {
            if let Some(action) = future.await {
                feedback(action);
            }
        },
    }
}

fn feedback(action: BookingAction) {
    match action {
        BookingAction::NotificationFailed { kind, error } => {
            tracing::warn!(kind, error = %error, "Notification delivery failed");
            metrics::record_notification_failed(kind);
        },
        other => tracing::debug!(action = ?other, "Ignoring effect feedback"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> Effect<BookingAction> {
        let counter = Arc::clone(counter);
        Effect::Future(Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            None
        }))
    }

    #[tokio::test]
    async fn runs_every_effect() {
        let counter = Arc::new(AtomicUsize::new(0));
        let effects: SmallVec<[Effect<BookingAction>; 4]> =
            smallvec![counting(&counter), Effect::None, counting(&counter)];

        run_effects(effects).await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_notifications_do_not_panic() {
        let effects: SmallVec<[Effect<BookingAction>; 4]> = smallvec![Effect::Future(Box::pin(async {
            Some(BookingAction::NotificationFailed {
                kind: "payment_confirmed",
                error: "smtp down".into(),
            })
        }))];

        run_effects(effects).await;
    }
}
