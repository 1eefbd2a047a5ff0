// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Failures of a validation call.
//!
//! These are distinct from rejections: a [`ValidatorError`] means no trust
//! decision could be made at all, while a rejected token is reported as
//! [`VerificationOutcome::Invalid`](crate::auth::VerificationOutcome).

use crate::auth::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum ValidatorError {
    #[error("trust material unavailable from {url}: {message}")]
    TrustMaterialUnavailable {
        url: String,
        status: Option<u16>,
        message: String,
    },

    #[error("key set contains no usable symmetric key")]
    NoUsableKey,

    #[error("revocation check failed: {0}")]
    RevocationCheckFailed(String),

    #[error("token is malformed: {0}")]
    MalformedToken(String),

    #[error("blocking runtime unavailable: {0}")]
    Runtime(String),

    #[error("validation worker failed: {0}")]
    Worker(String),
}

impl ValidatorError {
    pub(crate) fn unavailable(url: &str, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::TrustMaterialUnavailable {
            url: url.to_string(),
            status,
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ValidatorError::TrustMaterialUnavailable { .. } => ErrorCode::TrustMaterialUnavailable,
            ValidatorError::NoUsableKey => ErrorCode::NoUsableKey,
            ValidatorError::RevocationCheckFailed(_) => ErrorCode::RevocationCheckFailed,
            ValidatorError::MalformedToken(_) => ErrorCode::MalformedToken,
            ValidatorError::Runtime(_) | ValidatorError::Worker(_) => ErrorCode::ValidationException,
        }
    }
}

pub type ValidatorResult<T> = Result<T, ValidatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_records_url_and_status() {
        let err = ValidatorError::unavailable("http://issuer/jwks", Some(500), "HTTP 500");
        match &err {
            ValidatorError::TrustMaterialUnavailable { url, status, .. } => {
                assert_eq!(url, "http://issuer/jwks");
                assert_eq!(*status, Some(500));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.error_code(), ErrorCode::TrustMaterialUnavailable);
        assert_eq!(
            err.to_string(),
            "trust material unavailable from http://issuer/jwks: HTTP 500"
        );
    }

    #[test]
    fn error_codes_map_each_variant() {
        assert_eq!(ValidatorError::NoUsableKey.error_code(), ErrorCode::NoUsableKey);
        assert_eq!(
            ValidatorError::RevocationCheckFailed("down".into()).error_code(),
            ErrorCode::RevocationCheckFailed
        );
        assert_eq!(
            ValidatorError::Worker("panicked".into()).error_code(),
            ErrorCode::ValidationException
        );
    }
}
