// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Trust material: the verification key and the accepted algorithm,
//! issuer and audience.
//!
//! ## Sources
//!
//! - **Local**: built once from this service's own signing secret. No network.
//! - **Remote**: the key set and token config are fetched from two issuer
//!   endpoints, each cached independently with the trust material TTL.
//!
//! Only symmetric (`oct`) keys can be used. Other key types in a remote key
//! set are skipped; a key set with no usable key is an error.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use base64ct::{Base64UrlUnpadded, Encoding};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use serde_json::Value;

use super::issuer::IssuerClient;
use crate::cache::CachedFetcher;
use crate::config::{LocalSigning, ValidatorSettings, DEFAULT_ALGORITHM};
use crate::error::{ValidatorError, ValidatorResult};

/// Key ID advertised for the local signing secret.
pub const LOCAL_KEY_ID: &str = "user-service-key-1";

/// JWK key type for symmetric keys.
pub const SYMMETRIC_KEY_TYPE: &str = "oct";

/// A symmetric verification key.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub key_id: Option<String>,
    pub key_type: String,
    pub key_bytes: Vec<u8>,
    pub algorithm: Option<Algorithm>,
}

impl KeyMaterial {
    /// Key material for this service's own secret.
    pub fn from_secret(secret: &str, algorithm: Algorithm) -> Self {
        Self {
            key_id: Some(LOCAL_KEY_ID.to_string()),
            key_type: SYMMETRIC_KEY_TYPE.to_string(),
            key_bytes: secret.as_bytes().to_vec(),
            algorithm: Some(algorithm),
        }
    }

    /// The key as base64url without padding, as published in a JWK `k`.
    pub fn encoded(&self) -> String {
        Base64UrlUnpadded::encode_string(&self.key_bytes)
    }

    pub fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(&self.key_bytes)
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key_id", &self.key_id)
            .field("key_type", &self.key_type)
            .field("key_bytes", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// Which algorithm, issuer and audience are accepted.
///
/// A `None` issuer or audience disables that check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustConfig {
    pub algorithm: Algorithm,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl From<&LocalSigning> for TrustConfig {
    fn from(signing: &LocalSigning) -> Self {
        Self {
            algorithm: signing.algorithm,
            issuer: Some(signing.issuer.clone()),
            audience: Some(signing.audience.clone()),
        }
    }
}

/// One entry of a JWK set, read leniently.
#[derive(Debug, Deserialize)]
struct RawJwk {
    kty: String,
    #[serde(default)]
    k: Option<String>,
    #[serde(default)]
    alg: Option<String>,
    #[serde(default)]
    kid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwkDocument {
    #[serde(default)]
    keys: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    algorithm: Option<String>,
    #[serde(default)]
    issuer: Option<String>,
    #[serde(default)]
    audience: Option<String>,
}

/// Pick the first usable symmetric key from a JWK set document.
fn select_symmetric_key(document: JwkDocument) -> ValidatorResult<KeyMaterial> {
    document
        .keys
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<RawJwk>(entry).ok())
        .filter(|jwk| jwk.kty == SYMMETRIC_KEY_TYPE)
        .find_map(|jwk| {
            let encoded = jwk.k?;
            let key_bytes = Base64UrlUnpadded::decode_vec(encoded.trim_end_matches('=')).ok()?;
            if key_bytes.is_empty() {
                return None;
            }
            Some(KeyMaterial {
                key_id: jwk.kid,
                key_type: jwk.kty,
                key_bytes,
                algorithm: jwk.alg.and_then(|alg| Algorithm::from_str(&alg).ok()),
            })
        })
        .ok_or(ValidatorError::NoUsableKey)
}

/// Parse a config document, unwrapping an optional `{"data": {...}}` envelope.
fn parse_config(url: &str, body: Value) -> ValidatorResult<TrustConfig> {
    let inner = match body {
        Value::Object(mut map) if map.get("data").is_some_and(Value::is_object) => {
            map.remove("data").unwrap_or_default()
        }
        other => other,
    };

    let document: ConfigDocument = serde_json::from_value(inner)
        .map_err(|e| ValidatorError::unavailable(url, None, e.to_string()))?;

    let algorithm = match document.algorithm.as_deref() {
        None => DEFAULT_ALGORITHM,
        Some(name) => Algorithm::from_str(name).map_err(|_| {
            ValidatorError::unavailable(url, None, format!("unsupported algorithm {name}"))
        })?,
    };

    Ok(TrustConfig {
        algorithm,
        issuer: document.issuer,
        audience: document.audience,
    })
}

/// Trust material fetched from the issuer and cached.
pub struct RemoteTrust {
    client: Arc<IssuerClient>,
    keys: CachedFetcher<KeyMaterial>,
    config: CachedFetcher<TrustConfig>,
}

impl RemoteTrust {
    pub fn new(client: Arc<IssuerClient>, settings: &ValidatorSettings) -> Self {
        Self {
            client,
            keys: CachedFetcher::new("jwks", settings.trust_cache_ttl),
            config: CachedFetcher::new("jwt_config", settings.trust_cache_ttl),
        }
    }

    async fn fetch_key_material(&self) -> ValidatorResult<KeyMaterial> {
        let url = self.client.issuer().jwks_url();
        tracing::info!(url = %url, "Fetching key set from issuer");
        let document: JwkDocument = self.client.get_json(&url).await.inspect_err(|e| {
            tracing::error!(url = %url, error = %e, "Key set fetch failed");
        })?;
        select_symmetric_key(document)
    }

    async fn fetch_trust_config(&self) -> ValidatorResult<TrustConfig> {
        let url = self.client.issuer().config_url();
        tracing::info!(url = %url, "Fetching token config from issuer");
        let body: Value = self.client.get_json(&url).await.inspect_err(|e| {
            tracing::error!(url = %url, error = %e, "Token config fetch failed");
        })?;
        parse_config(&url, body)
    }
}

/// Produces trust material for the validator's mode.
pub enum TrustMaterialProvider {
    Local {
        key: KeyMaterial,
        config: TrustConfig,
    },
    Remote(RemoteTrust),
}

impl TrustMaterialProvider {
    pub fn local(signing: &LocalSigning) -> Self {
        TrustMaterialProvider::Local {
            key: KeyMaterial::from_secret(&signing.secret, signing.algorithm),
            config: TrustConfig::from(signing),
        }
    }

    pub async fn key_material(&self) -> ValidatorResult<KeyMaterial> {
        match self {
            TrustMaterialProvider::Local { key, .. } => Ok(key.clone()),
            TrustMaterialProvider::Remote(remote) => {
                remote
                    .keys
                    .get_or_fetch(|| remote.fetch_key_material())
                    .await
            }
        }
    }

    pub async fn trust_config(&self) -> ValidatorResult<TrustConfig> {
        match self {
            TrustMaterialProvider::Local { config, .. } => Ok(config.clone()),
            TrustMaterialProvider::Remote(remote) => {
                remote
                    .config
                    .get_or_fetch(|| remote.fetch_trust_config())
                    .await
            }
        }
    }

    /// Drop cached remote material. No-op in local mode.
    pub fn invalidate(&self) {
        if let TrustMaterialProvider::Remote(remote) = self {
            remote.keys.invalidate();
            remote.config.invalidate();
        }
    }
}
