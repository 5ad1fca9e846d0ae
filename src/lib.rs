//! Admin console client for the Moc F&B management backend.
//!
//! The core is [`api::ApiClient`], which attaches the stored bearer token to
//! every request, refuses to send requests with an expired token, and tears
//! the [`session::Session`] down when the backend answers 401.

pub mod api;
pub mod commands;
pub mod config;
pub mod session;
pub mod state;
