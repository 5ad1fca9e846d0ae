//! Error type shared by the client, resource endpoints, and auth flows.

use reqwest::StatusCode;
use thiserror::Error;

use crate::session::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The stored token was expired before the request was sent. The session
    /// has already been torn down and nothing reached the network.
    #[error("Access token expired; sign in again")]
    TokenExpired,

    /// The backend answered 401. The session has already been torn down; the
    /// original response is kept for the caller.
    #[error("Unauthorized ({})", .0.status())]
    Unauthorized(reqwest::Response),

    /// Connection, TLS, timeout, or other transport failure.
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Session storage failed: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Non-success status seen while interpreting a response body.
    #[error("Request failed ({status}): {body}")]
    Status { status: StatusCode, body: String },

    /// The envelope came back with `success: false`.
    #[error("Backend rejected the request: {0}")]
    Rejected(String),

    #[error("Failed to parse response: {0}")]
    Decode(String),

    #[error("Login response did not contain a token")]
    MissingToken,

    #[error("Password and confirmation do not match")]
    PasswordMismatch,
}

impl ApiError {
    /// Whether this error ended the local session.
    pub fn is_session_ended(&self) -> bool {
        matches!(self, ApiError::TokenExpired | ApiError::Unauthorized(_))
    }
}
