//! HTTP request handlers shared by every deployment.

pub mod health;

pub use health::{ReadinessReport, health_check, readiness_check};
