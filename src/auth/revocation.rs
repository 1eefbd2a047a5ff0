// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token revocation checks.
//!
//! ## Failure policy
//!
//! - **Local mode** asks a co-located [`RevocationStore`]. Store errors are
//!   propagated (fail-closed): an unreachable store next to the issuer is
//!   itself suspicious.
//! - **Remote mode** consults a list of fingerprints fetched from the issuer
//!   and cached with a short TTL. A failed fetch is treated as an empty list
//!   (fail-open) and that empty snapshot is cached for the TTL, so a degraded
//!   issuer does not block all traffic. Revocations may be missed for at most
//!   one TTL window; a token is never reported revoked when it is not.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::issuer::IssuerClient;
use crate::cache::CachedFetcher;
use crate::config::ValidatorSettings;
use crate::error::{ValidatorError, ValidatorResult};

/// One-way fingerprint of a token: lowercase hex SHA-256 of the raw string.
pub fn fingerprint(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Error reported by a revocation store.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct StoreError(pub String);

/// Revocation store shared with the token issuer (e.g. a key-value store).
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Whether `token` has been revoked.
    async fn is_revoked(&self, token: &str) -> Result<bool, StoreError>;
}

/// In-process revocation store keyed by fingerprint.
#[derive(Debug, Default)]
pub struct InMemoryRevocationStore {
    fingerprints: RwLock<HashSet<String>>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revoke(&self, token: &str) {
        self.fingerprints
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(fingerprint(token));
    }

    pub fn len(&self) -> usize {
        self.fingerprints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn is_revoked(&self, token: &str) -> Result<bool, StoreError> {
        let fingerprints = self
            .fingerprints
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(fingerprints.contains(&fingerprint(token)))
    }
}

#[derive(Debug, Default, Deserialize)]
struct BlacklistData {
    #[serde(default)]
    blacklisted_tokens: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BlacklistDocument {
    #[serde(default)]
    data: BlacklistData,
}

/// Revocation list fetched from the issuer.
pub struct RemoteRevocationList {
    client: Arc<IssuerClient>,
    list: CachedFetcher<Arc<HashSet<String>>>,
}

impl RemoteRevocationList {
    pub fn new(client: Arc<IssuerClient>, settings: &ValidatorSettings) -> Self {
        Self {
            client,
            list: CachedFetcher::new("blacklist", settings.revocation_cache_ttl),
        }
    }

    /// Fetch the list, degrading to empty on any failure.
    async fn fetch(&self) -> Result<Arc<HashSet<String>>, std::convert::Infallible> {
        let url = self.client.issuer().blacklist_url();
        match self.client.get_json::<BlacklistDocument>(&url).await {
            Ok(document) => {
                let fingerprints: HashSet<String> =
                    document.data.blacklisted_tokens.into_iter().collect();
                tracing::debug!(count = fingerprints.len(), "Revocation list refreshed");
                Ok(Arc::new(fingerprints))
            }
            Err(e) => {
                tracing::warn!(
                    url = %url,
                    error = %e,
                    "Revocation list unavailable, treating as empty"
                );
                Ok(Arc::new(HashSet::new()))
            }
        }
    }

    async fn contains(&self, token: &str) -> bool {
        let fingerprints = match self.list.get_or_fetch(|| self.fetch()).await {
            Ok(list) => list,
            Err(never) => match never {},
        };
        fingerprints.contains(&fingerprint(token))
    }
}

/// Answers "is this token revoked?" for the validator's mode.
pub enum RevocationOracle {
    Local(Arc<dyn RevocationStore>),
    Remote(RemoteRevocationList),
}

impl RevocationOracle {
    pub async fn is_revoked(&self, token: &str) -> ValidatorResult<bool> {
        match self {
            RevocationOracle::Local(store) => store
                .is_revoked(token)
                .await
                .map_err(|e| ValidatorError::RevocationCheckFailed(e.to_string())),
            RevocationOracle::Remote(list) => Ok(list.contains(token).await),
        }
    }

    /// Drop the cached revocation list. No-op in local mode.
    pub fn invalidate(&self) {
        if let RevocationOracle::Remote(list) = self {
            list.list.invalidate();
        }
    }
}
