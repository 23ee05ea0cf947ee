//! Payment gateway adapter: the HTTP client and webhook authentication.

pub mod paystack;
pub mod signature;

pub use paystack::PaystackClient;
