//! School backend API access.

pub mod client;
pub mod error;

pub use client::{ApiClient, ClientConfig, LoginRequest};
pub use error::ApiError;
