// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity Token Validator - bearer token validation for identity-backed services
//!
//! ## Modules
//!
//! - `auth` - Verification pipeline, trust material and revocation
//! - `cache` - TTL caches for fetched artifacts
//! - `config` - Settings and environment loading
//! - `error` - Validator errors
//! - `logging` - Tracing subscriber setup

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod logging;

pub use auth::{
    ErrorCode, InMemoryRevocationStore, Rejection, RevocationStore, TokenClaims, TokenValidator,
    VerificationOutcome,
};
pub use config::{ConfigError, ValidationMode, ValidatorSettings};
pub use error::{ValidatorError, ValidatorResult};
