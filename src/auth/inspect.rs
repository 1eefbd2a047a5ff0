// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signature-free token inspection.
//!
//! WARNING: nothing here checks the signature. Use these for logging and
//! diagnostics only, never to decide whether a caller is authorized.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::claims::{timestamp, UnverifiedClaims};
use crate::error::{ValidatorError, ValidatorResult};

fn decode_unverified(token: &str) -> ValidatorResult<Map<String, Value>> {
    jsonwebtoken::dangerous::insecure_decode::<Map<String, Value>>(token)
        .map(|data| data.claims)
        .map_err(|e| ValidatorError::MalformedToken(e.to_string()))
}

/// Decode the payload without verifying it.
pub fn extract_claims_unverified(token: &str) -> ValidatorResult<UnverifiedClaims> {
    decode_unverified(token).map(|payload| UnverifiedClaims::from_payload(&payload))
}

/// Expiry as a UTC timestamp, if the token parses and carries `exp`.
pub fn expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = decode_unverified(token).ok()?;
    let exp = payload.get("exp").and_then(timestamp)?;
    DateTime::from_timestamp(exp, 0)
}

/// True when the token cannot be parsed, has no `exp`, or `exp` has passed.
pub fn is_expired(token: &str) -> bool {
    match expiry(token) {
        Some(expires_at) => Utc::now() > expires_at,
        None => true,
    }
}
