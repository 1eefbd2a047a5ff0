// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Token Validation
//!
//! Decides whether a bearer token presented to a service is authentic,
//! unexpired, well-formed and not revoked.
//!
//! ## Modes
//!
//! - **Local**: the issuing service validates with its own signing secret and
//!   asks a co-located [`RevocationStore`].
//! - **Remote**: downstream services fetch the key set, token config and
//!   revocation list from the issuer over HTTP and cache them.
//!
//! ## Flow
//!
//! 1. Trust material (key + algorithm/issuer/audience) is obtained, from
//!    memory or the cache
//! 2. Signature, `exp`, `iss`, `aud` and `iat` are checked
//! 3. Claim shapes are checked (`sub`, `username`, `roles`)
//! 4. Account status and token type are checked
//! 5. The token fingerprint is checked against the revocation source
//!
//! Rejections are values ([`VerificationOutcome::Invalid`]); only failures to
//! establish trust at all are errors.

pub mod claims;
pub mod inspect;
pub mod issuer;
pub mod outcome;
pub mod revocation;
pub mod trust;
pub mod validator;
pub mod verifier;

pub use claims::{TokenClaims, UnverifiedClaims};
pub use outcome::{ErrorCode, Rejection, VerificationOutcome};
pub use revocation::{fingerprint, InMemoryRevocationStore, RevocationStore, StoreError};
pub use trust::{KeyMaterial, TrustConfig};
pub use validator::TokenValidator;
