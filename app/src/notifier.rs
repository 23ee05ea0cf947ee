//! Log-backed notification channel.

use marketplace_core::BoxFuture;
use marketplace_core::notify::{Notification, Notifier, NotifyError};
use tracing::info;

/// Notifier that writes each notification to the log instead of delivering it.
///
/// Stands in until a delivery service is wired up; the structured payload
/// is what a delivery service would receive.
#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    /// Create a new log notifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) -> BoxFuture<'_, Result<(), NotifyError>> {
        Box::pin(async move {
            let payload = serde_json::to_string(&notification).map_err(|e| NotifyError(e.to_string()))?;
            info!(
                kind = notification.kind(),
                booking_id = %notification.booking_id(),
                payload = %payload,
                "Notification"
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketplace_core::types::{BookingId, UserId};

    #[tokio::test]
    async fn always_delivers() {
        let result = LogNotifier::new()
            .notify(Notification::BookingApproved {
                booking_id: BookingId::new(),
                code: "ACC-7K2M9QXA".into(),
                explorer: UserId::new(),
                message: None,
            })
            .await;

        assert!(result.is_ok());
    }
}
