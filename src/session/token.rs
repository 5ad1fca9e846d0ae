//! Client-side inspection of JWT access tokens.
//!
//! The payload is decoded without verifying the signature. The backend
//! re-validates every request, so the result only decides whether a request
//! is worth sending at all.

use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TokenError {
    #[error("Invalid JWT format")]
    InvalidFormat,
    #[error("Failed to decode JWT payload: {0}")]
    Decode(String),
    #[error("JWT payload missing 'exp' claim")]
    MissingExpiry,
}

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// A clock set before the epoch reads as `u64::MAX`, which expires every token.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(u64::MAX)
}

/// Decode the JSON claims (second segment) of a JWT.
///
/// Only the payload segment is required; header and signature are ignored.
pub fn decode_claims(token: &str) -> Result<serde_json::Value, TokenError> {
    let payload = token.split('.').nth(1).ok_or(TokenError::InvalidFormat)?;

    // Accept both padded and unpadded base64url.
    let payload = payload.trim_end_matches('=');
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| TokenError::Decode(e.to_string()))?;

    let claims: serde_json::Value =
        serde_json::from_slice(&decoded).map_err(|e| TokenError::Decode(e.to_string()))?;
    if !claims.is_object() {
        return Err(TokenError::Decode("payload is not a JSON object".to_string()));
    }
    Ok(claims)
}

/// Read the `exp` claim in seconds since the epoch.
///
/// A zero or non-numeric `exp` counts as missing.
pub fn expiry_seconds(token: &str) -> Result<f64, TokenError> {
    let claims = decode_claims(token)?;
    claims["exp"]
        .as_f64()
        .filter(|exp| *exp != 0.0)
        .ok_or(TokenError::MissingExpiry)
}

/// Whether the token is expired at `now_ms`. Fails closed.
pub fn is_expired_at(token: &str, now_ms: u64) -> bool {
    match expiry_seconds(token) {
        Ok(exp) => exp * 1000.0 < now_ms as f64,
        Err(e) => {
            log::debug!("Treating undecodable token as expired: {}", e);
            true
        }
    }
}

/// Whether the token is expired right now.
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, now_ms())
}

/// Build an unsigned token carrying `claims`, for tests.
#[cfg(test)]
pub(crate) fn forge_token(claims: &serde_json::Value) -> String {
    let engine = &base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let header = engine.encode(b"{\"alg\":\"HS256\",\"typ\":\"JWT\"}");
    let payload = engine.encode(claims.to_string().as_bytes());
    format!("{}.{}.fake-signature", header, payload)
}

/// Build an unsigned token expiring `offset_secs` from now, for tests.
#[cfg(test)]
pub(crate) fn token_expiring_in(offset_secs: i64) -> String {
    let now_secs = (now_ms() / 1000) as i64;
    forge_token(&serde_json::json!({
        "sub": "admin@fbstore.com",
        "exp": now_secs + offset_secs,
    }))
}
