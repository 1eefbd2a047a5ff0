// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verification outcomes and rejection codes.

use serde::Serialize;
use serde_json::{Map, Value};

use super::claims::TokenClaims;

/// Machine-readable reason a token was rejected or a call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad signature, expired, issuer/audience mismatch or malformed token
    JwtDecodeError,
    MissingRequiredField,
    InvalidFieldType,
    UserInactive,
    InvalidTokenType,
    TokenBlacklisted,
    NoUsableKey,
    TrustMaterialUnavailable,
    /// Blocking entry point called in local mode
    UseAsyncPath,
    RevocationCheckFailed,
    MalformedToken,
    ValidationException,
}

impl ErrorCode {
    /// Wire name of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::JwtDecodeError => "JWT_DECODE_ERROR",
            ErrorCode::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            ErrorCode::InvalidFieldType => "INVALID_FIELD_TYPE",
            ErrorCode::UserInactive => "USER_INACTIVE",
            ErrorCode::InvalidTokenType => "INVALID_TOKEN_TYPE",
            ErrorCode::TokenBlacklisted => "TOKEN_BLACKLISTED",
            ErrorCode::NoUsableKey => "NO_USABLE_KEY",
            ErrorCode::TrustMaterialUnavailable => "TRUST_MATERIAL_UNAVAILABLE",
            ErrorCode::UseAsyncPath => "USE_ASYNC_PATH",
            ErrorCode::RevocationCheckFailed => "REVOCATION_CHECK_FAILED",
            ErrorCode::MalformedToken => "MALFORMED_TOKEN",
            ErrorCode::ValidationException => "VALIDATION_EXCEPTION",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a token was not accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub error_code: ErrorCode,
    /// Short snake_case tag, e.g. `jwt_error` or `token_blacklisted`
    pub reason: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl Rejection {
    fn new(error_code: ErrorCode, reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            error_code,
            reason,
            message: message.into(),
            details: Map::new(),
        }
    }

    fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn jwt_decode(message: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorCode::JwtDecodeError,
            "jwt_error",
            format!("token verification failed: {message}"),
        )
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            "validation_error",
            format!("token is missing required field: {field}"),
        )
        .with_detail("missing_field", field)
    }

    pub fn invalid_field_type(field: &str, expected: &str) -> Self {
        Self::new(
            ErrorCode::InvalidFieldType,
            "validation_error",
            format!("token field {field} must be {expected}"),
        )
        .with_detail("field", field)
        .with_detail("expected_type", expected)
    }

    pub fn user_inactive(user_id: &str) -> Self {
        Self::new(
            ErrorCode::UserInactive,
            "validation_error",
            "user account is disabled",
        )
        .with_detail("user_id", user_id)
    }

    pub fn invalid_token_type(expected: &str, actual: &str) -> Self {
        Self::new(
            ErrorCode::InvalidTokenType,
            "wrong_token_type",
            "token type is not accepted",
        )
        .with_detail("expected_type", expected)
        .with_detail("actual_type", actual)
    }

    pub fn blacklisted() -> Self {
        Self::new(
            ErrorCode::TokenBlacklisted,
            "token_blacklisted",
            "token has been revoked",
        )
    }

    pub fn no_usable_key() -> Self {
        Self::new(
            ErrorCode::NoUsableKey,
            "no_key",
            "no usable verification key is available",
        )
    }

    pub fn use_async_path() -> Self {
        Self::new(
            ErrorCode::UseAsyncPath,
            "use_async",
            "local mode requires the asynchronous verification path",
        )
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.error_code)
    }
}

/// Result of verifying a token.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    Valid(TokenClaims),
    Invalid(Rejection),
}

impl VerificationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationOutcome::Valid(_))
    }

    pub fn claims(&self) -> Option<&TokenClaims> {
        match self {
            VerificationOutcome::Valid(claims) => Some(claims),
            VerificationOutcome::Invalid(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            VerificationOutcome::Valid(_) => None,
            VerificationOutcome::Invalid(rejection) => Some(rejection),
        }
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.rejection().map(|r| r.error_code)
    }
}

impl From<Rejection> for VerificationOutcome {
    fn from(rejection: Rejection) -> Self {
        VerificationOutcome::Invalid(rejection)
    }
}
