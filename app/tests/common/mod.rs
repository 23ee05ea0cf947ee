//! Shared harness: the real router over in-memory collaborators.

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use marketplace::auth::{USER_EMAIL_HEADER, USER_ID_HEADER, USER_ROLE_HEADER};
use marketplace::gateway::signature::{SIGNATURE_HEADER, sign};
use marketplace::{AppState, Collaborators, PaymentPolicy, build_router};
use marketplace_core::commission::CommissionRates;
use marketplace_core::types::{Category, Percentage, UserId};
use marketplace_core::vendor::VendorProfile;
use marketplace_testing::{
    InMemoryStore, MockGateway, RecordingNotifier, StaticListings, active_subaccount, test_clock,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

/// Webhook signing key used by every harness
pub const SECRET: &str = "sk_test_3f9a1c";

/// A caller identified by the session headers
#[derive(Clone, Copy, Debug)]
pub struct Caller {
    pub id: UserId,
    pub role: &'static str,
}

impl Caller {
    pub fn explorer() -> Self {
        Self {
            id: UserId::new(),
            role: "explorer",
        }
    }

    pub fn vendor(id: UserId) -> Self {
        Self { id, role: "vendor" }
    }

    pub fn admin() -> Self {
        Self {
            id: UserId::new(),
            role: "admin",
        }
    }
}

pub struct Harness {
    pub store: InMemoryStore,
    pub gateway: MockGateway,
    pub notifier: RecordingNotifier,
    pub listings: StaticListings,
    pub router: Router,
}

impl Harness {
    /// Router with the standard rates seeded
    pub fn new() -> Self {
        let store = InMemoryStore::new();
        let gateway = MockGateway::new();
        let notifier = RecordingNotifier::new();
        let listings = StaticListings::new();
        store.seed_configuration(CommissionRates {
            events: Percentage::from_bps(1_000).unwrap(),
            accommodations: Percentage::from_bps(1_200).unwrap(),
            leisure: Percentage::from_bps(500).unwrap(),
            movies_and_cinema: Percentage::from_bps(800).unwrap(),
        });
        let ports = Collaborators::with_store(
            Arc::new(store.clone()),
            Arc::new(listings.clone()),
            Arc::new(gateway.clone()),
            Arc::new(notifier.clone()),
            Arc::new(test_clock()),
        );
        let router = build_router(AppState::new(&ports, PaymentPolicy::default(), SECRET));
        Self {
            store,
            gateway,
            notifier,
            listings,
            router,
        }
    }

    /// Vendor with an active sub-account and one listing in `category`
    pub fn vendor_with_listing(&self, category: Category, listing_id: &str) -> UserId {
        let vendor = UserId::new();
        let mut profile = VendorProfile::new(vendor, Some(category));
        profile.subaccount = Some(active_subaccount("ACCT_0001"));
        self.store.put_vendor(profile);
        self.listings.add(category, listing_id, vendor);
        vendor
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        send(self.router.clone(), request).await
    }
}

pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

pub fn request(method: Method, uri: &str, caller: Option<Caller>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(caller) = caller {
        builder = builder
            .header(USER_ID_HEADER, caller.id.to_string())
            .header(USER_ROLE_HEADER, caller.role)
            .header(USER_EMAIL_HEADER, "payer@example.com");
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Webhook delivery signed with `signature`
pub fn webhook(body: &Value, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/webhooks/paystack")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Webhook delivery signed with the harness secret
pub fn signed_webhook(event: &str, reference: &str) -> Request<Body> {
    let body = json!({ "event": event, "data": { "reference": reference, "status": "success" } });
    let signature = sign(SECRET, body.to_string().as_bytes());
    webhook(&body, Some(&signature))
}
