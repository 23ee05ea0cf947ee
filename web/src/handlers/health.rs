//! Health check endpoints.
//!
//! Used by load balancers and orchestrators. `/health` says the process is
//! up; `/ready` additionally checks that the store answers.

use axum::{Json, extract::State, http::StatusCode};
use marketplace_core::store::BookingStore;
use serde::Serialize;
use std::sync::Arc;

/// Liveness.
///
/// ```text
/// GET /health  ->  200 "ok"
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness report
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    /// Component checked
    pub component: &'static str,
    /// `healthy` or `unhealthy`
    pub status: &'static str,
    /// Failure detail, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Readiness: pings the store.
///
/// - 200 OK when the store answers
/// - 503 Service Unavailable otherwise
///
/// The router state must provide an `Arc<dyn BookingStore>` through
/// `FromRef`.
pub async fn readiness_check(
    State(store): State<Arc<dyn BookingStore>>,
) -> (StatusCode, Json<ReadinessReport>) {
    match store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessReport {
                component: "store",
                status: "healthy",
                message: None,
            }),
        ),
        Err(error) => {
            tracing::warn!(error = %error, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessReport {
                    component: "store",
                    status: "unhealthy",
                    message: Some("store unavailable".to_string()),
                }),
            )
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketplace_testing::InMemoryStore;

    #[tokio::test]
    async fn test_simple_health_check() {
        let (status, body) = health_check().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_readiness_with_available_store() {
        let store: Arc<dyn BookingStore> = Arc::new(InMemoryStore::new());

        let (status, Json(report)) = readiness_check(State(store)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(report.status, "healthy");
    }

    #[tokio::test]
    async fn test_readiness_with_unavailable_store() {
        let memory = InMemoryStore::new();
        memory.set_unavailable(true);
        let store: Arc<dyn BookingStore> = Arc::new(memory);

        let (status, Json(report)) = readiness_check(State(store)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(report.status, "unhealthy");
    }
}
