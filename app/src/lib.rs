//! Booking, payment and settlement server for a multi-vertical marketplace.
//!
//! Explorers book events, accommodations, leisure activities and cinema
//! tickets; vendors approve accommodation requests and get paid through
//! gateway sub-accounts; the platform keeps a commission per vertical.
//!
//! # Architecture
//!
//! ```text
//!   client ──► /api/initialize-payment ──► CheckoutService ──► gateway
//!   client ──► /api/verify-payment ──┐
//!                                     ├──► Reconciler ──► verify ──► guarded confirm
//!   gateway ─► /api/webhooks/paystack ┘                              │
//!                                                                    ▼
//!                                               booking reducer ──► notifications
//! ```
//!
//! Decisions live in `marketplace-core` (booking reducer, commission and
//! split arithmetic); this crate wires them to Postgres, the gateway's REST
//! API and Axum.
//!
//! # Modules
//!
//! - [`config`]: environment configuration
//! - [`gateway`]: gateway REST client and webhook signatures
//! - [`services`]: application services behind every endpoint
//! - [`api`]: HTTP handlers
//! - [`server`]: state and router

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod api;
pub mod auth;
pub mod config;
pub mod gateway;
pub mod metrics;
pub mod notifier;
pub mod server;
pub mod services;

pub use config::Config;
pub use server::{AppState, build_router};
pub use services::{Collaborators, PaymentPolicy};
