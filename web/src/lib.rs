//! Axum integration for the booking marketplace.
//!
//! The marketplace follows "functional core, imperative shell": reducers and
//! split arithmetic in `marketplace-core` decide, the HTTP layer only parses
//! requests, calls services and maps results.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Imperative Shell (Axum)         │  ← HTTP, JSON, webhooks
//! │  - Request parsing                      │  ← Correlation ids
//! │  - Error mapping (AppError)             │  ← Logging
//! ├─────────────────────────────────────────┤
//! │         Functional Core                 │
//! │  - Booking reducer                      │  ← Pure transitions
//! │  - Commission and split arithmetic      │  ← Effect descriptions
//! └─────────────────────────────────────────┘
//! ```
//!
//! This crate holds the pieces every router needs: [`AppError`], the
//! correlation-id middleware, request extractors and health handlers.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{ClientIp, CorrelationId};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
