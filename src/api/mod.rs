/// Image-generation provider integration
///
/// - client.rs: HTTP client with per-provider request/response handling
/// - sizes.rs: fixed per-provider output size tables

pub mod client;
pub mod sizes;

pub use client::{ApiClient, ApiError};
