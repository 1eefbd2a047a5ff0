// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token claims.
//!
//! Two representations exist on purpose:
//!
//! - [`TokenClaims`] is only produced by a successful verification and is the
//!   one to use for authorization.
//! - [`UnverifiedClaims`] is decoded without checking the signature. It is for
//!   logging and diagnostics and cannot be converted into [`TokenClaims`].

use serde::Serialize;
use serde_json::{Map, Value};

use super::outcome::Rejection;

/// Token type accepted by verification.
pub const ACCESS_TOKEN_TYPE: &str = "access";

/// Claims of a verified token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenClaims {
    /// Canonical user ID (`sub` claim)
    pub user_id: String,
    pub username: String,
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
    /// `type` claim; absent on tokens minted before the claim existed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Issued at (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,
    /// Expiration (Unix timestamp)
    pub expires_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub audience: Vec<String>,
}

impl TokenClaims {
    /// Build claims from a signature-checked payload, enforcing field shapes.
    ///
    /// `sub`, `username` and `roles` are required; `roles` must be an array
    /// of strings. `is_active` defaults to `true` and `is_superuser` to
    /// `false`, matching issuance defaults. Profile fields are read leniently.
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self, Rejection> {
        for field in ["sub", "username", "roles"] {
            if !payload.contains_key(field) {
                return Err(Rejection::missing_field(field));
            }
        }

        let user_id = required_string(payload, "sub")?;
        let username = required_string(payload, "username")?;
        let roles = string_array(payload, "roles")?;

        let expires_at = payload
            .get("exp")
            .and_then(timestamp)
            .ok_or_else(|| Rejection::jwt_decode("token has no valid exp claim"))?;

        Ok(Self {
            user_id,
            username,
            roles,
            email: optional_text(payload, "email"),
            phone: optional_text(payload, "phone"),
            full_name: optional_text(payload, "full_name"),
            is_active: is_active(payload),
            is_superuser: payload.get("is_superuser") == Some(&Value::Bool(true)),
            token_type: token_type(payload),
            issued_at: payload.get("iat").and_then(timestamp),
            expires_at,
            issuer: payload.get("iss").and_then(Value::as_str).map(str::to_string),
            audience: audience(payload),
        })
    }
}

/// Claims decoded without signature verification.
///
/// Never use these for authorization decisions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnverifiedClaims {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub roles: Vec<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub full_name: Option<String>,
    pub language: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
    pub issued_at: Option<i64>,
    pub expires_at: Option<i64>,
}

impl UnverifiedClaims {
    /// Lenient extraction: wrong shapes become absent values.
    pub fn from_payload(payload: &Map<String, Value>) -> Self {
        let text = |name: &str| payload.get(name).and_then(Value::as_str).map(str::to_string);
        let roles = payload
            .get("roles")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            user_id: text("sub"),
            username: text("username"),
            roles,
            email: text("email"),
            phone: text("phone"),
            full_name: text("full_name"),
            language: text("language"),
            is_active: payload
                .get("is_active")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            is_superuser: payload
                .get("is_superuser")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            issued_at: payload.get("iat").and_then(timestamp),
            expires_at: payload.get("exp").and_then(timestamp),
        }
    }
}

/// Read a NumericDate claim, accepting integer or fractional seconds.
pub(crate) fn timestamp(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|secs| secs as i64))
}

fn required_string(payload: &Map<String, Value>, field: &str) -> Result<String, Rejection> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Rejection::invalid_field_type(field, "string"))
}

/// Profile fields: scalars are kept as text, anything else is dropped.
fn optional_text(payload: &Map<String, Value>, field: &str) -> Option<String> {
    match payload.get(field)? {
        Value::String(s) => Some(s.clone()),
        scalar @ (Value::Number(_) | Value::Bool(_)) => Some(scalar.to_string()),
        _ => None,
    }
}

/// Absent means active; when present, only `true` does.
fn is_active(payload: &Map<String, Value>) -> bool {
    match payload.get("is_active") {
        None => true,
        Some(value) => *value == Value::Bool(true),
    }
}

/// JSON values that count as "no value" for optional tags.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

fn string_array(payload: &Map<String, Value>, field: &str) -> Result<Vec<String>, Rejection> {
    let items = payload
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| Rejection::invalid_field_type(field, "list"))?;

    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| Rejection::invalid_field_type(field, "list of strings"))
        })
        .collect()
}

fn token_type(payload: &Map<String, Value>) -> Option<String> {
    match payload.get("type")? {
        value if is_falsy(value) => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn audience(payload: &Map<String, Value>) -> Vec<String> {
    match payload.get("aud") {
        Some(Value::String(aud)) => vec![aud.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
