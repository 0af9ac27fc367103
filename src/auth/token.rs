//! Reads the expiry claim of a JWT access token. The signature is not
//! checked; the server stays the authority on validity.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{ DateTime, Utc };
use serde::Deserialize;

#[derive(Deserialize)]
struct Claims {
    exp: Option<i64>,
}

pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.exp?, 0)
}

/// True when the token decodes and its expiry lies after `now`.
pub fn is_fresh(token: &str, now: DateTime<Utc>) -> bool {
    expires_at(token).map_or(false, |exp| exp > now)
}
