//! API client module for the admin console.
//!
//! Provides the HTTP client with bearer-token injection and session teardown,
//! account flows, typed resource endpoints, and the request/response types of
//! the backend API.

pub mod auth;
pub mod client;
pub mod error;
pub mod resources;
pub mod types;


pub use client::{ApiClient, RequestBody, RequestOptions};
pub use error::ApiError;
