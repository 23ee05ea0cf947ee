//! HTTP server module for the marketplace.
//!
//! - Application state shared by the handlers
//! - Router configuration

pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
