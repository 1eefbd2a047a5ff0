// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Validator Configuration
//!
//! Settings for the token validator, built programmatically or loaded from
//! the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `AUTH_USE_LOCAL_JWT` | `true` when this process issues the tokens it validates | `true` |
//! | `JWT_SECRET_KEY` | Signing secret (local mode) | Required in local mode |
//! | `JWT_ALGORITHM` | Signing algorithm (local mode) | `HS256` |
//! | `JWT_ISSUER` | Expected issuer claim (local mode) | `identity-service` |
//! | `JWT_AUDIENCE` | Expected audience claim (local mode) | `microservices` |
//! | `AUTH_USER_SERVICE_URL` | Base URL of the trusted issuer | Required in remote mode |
//! | `AUTH_JWKS_ENDPOINT` | Key-set path on the issuer | `/api/v1/jwt/.well-known/jwks.json` |
//! | `AUTH_JWT_CONFIG_ENDPOINT` | Token config path on the issuer | `/api/v1/jwt/jwt-config` |
//! | `AUTH_BLACKLIST_ENDPOINT` | Revocation list path on the issuer | `/api/v1/jwt/blacklist` |
//! | `AUTH_CACHE_TTL_SECS` | Trust material cache TTL | `3600` |
//! | `AUTH_BLACKLIST_CACHE_TTL_SECS` | Revocation list cache TTL | `300` |
//! | `AUTH_HTTP_TIMEOUT_SECS` | Issuer request timeout | `10` |
//! | `AUTH_CLOCK_SKEW_SECS` | Leeway applied to `exp` checks | `0` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::{env, fmt, str::FromStr, time::Duration};

use jsonwebtoken::Algorithm;
use url::Url;

pub const USE_LOCAL_JWT_ENV: &str = "AUTH_USE_LOCAL_JWT";
pub const SECRET_KEY_ENV: &str = "JWT_SECRET_KEY";
pub const ALGORITHM_ENV: &str = "JWT_ALGORITHM";
pub const ISSUER_ENV: &str = "JWT_ISSUER";
pub const AUDIENCE_ENV: &str = "JWT_AUDIENCE";
pub const USER_SERVICE_URL_ENV: &str = "AUTH_USER_SERVICE_URL";
pub const JWKS_ENDPOINT_ENV: &str = "AUTH_JWKS_ENDPOINT";
pub const JWT_CONFIG_ENDPOINT_ENV: &str = "AUTH_JWT_CONFIG_ENDPOINT";
pub const BLACKLIST_ENDPOINT_ENV: &str = "AUTH_BLACKLIST_ENDPOINT";
pub const CACHE_TTL_ENV: &str = "AUTH_CACHE_TTL_SECS";
pub const BLACKLIST_CACHE_TTL_ENV: &str = "AUTH_BLACKLIST_CACHE_TTL_SECS";
pub const HTTP_TIMEOUT_ENV: &str = "AUTH_HTTP_TIMEOUT_SECS";
pub const CLOCK_SKEW_ENV: &str = "AUTH_CLOCK_SKEW_SECS";

/// Logging format selector, read by the binary.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_ALGORITHM: Algorithm = Algorithm::HS256;
pub const DEFAULT_ISSUER: &str = "identity-service";
pub const DEFAULT_AUDIENCE: &str = "microservices";
pub const DEFAULT_JWKS_ENDPOINT: &str = "/api/v1/jwt/.well-known/jwks.json";
pub const DEFAULT_JWT_CONFIG_ENDPOINT: &str = "/api/v1/jwt/jwt-config";
pub const DEFAULT_BLACKLIST_ENDPOINT: &str = "/api/v1/jwt/blacklist";

/// Trust material (key set + token config) cache TTL (1 hour).
pub const DEFAULT_TRUST_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Revocation list cache TTL (5 minutes).
pub const DEFAULT_REVOCATION_CACHE_TTL: Duration = Duration::from_secs(300);

/// Issuer HTTP request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Which trust topology a validator runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// This process issued the token and trusts its own signing secret.
    Local,
    /// Trust is delegated to an issuer reachable over HTTP.
    Remote,
}

/// Signing material for local mode.
#[derive(Clone)]
pub struct LocalSigning {
    pub secret: String,
    pub algorithm: Algorithm,
    pub issuer: String,
    pub audience: String,
}

impl fmt::Debug for LocalSigning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigning")
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

/// Location of the trusted issuer and its endpoints for remote mode.
#[derive(Debug, Clone)]
pub struct RemoteIssuer {
    /// Base URL without a trailing slash.
    pub base_url: String,
    pub jwks_endpoint: String,
    pub config_endpoint: String,
    pub blacklist_endpoint: String,
}

impl RemoteIssuer {
    /// Create an issuer reference with the default endpoint paths.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Url::parse(base_url).map_err(|e| ConfigError::Invalid {
            name: USER_SERVICE_URL_ENV,
            reason: e.to_string(),
        })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            jwks_endpoint: DEFAULT_JWKS_ENDPOINT.to_string(),
            config_endpoint: DEFAULT_JWT_CONFIG_ENDPOINT.to_string(),
            blacklist_endpoint: DEFAULT_BLACKLIST_ENDPOINT.to_string(),
        })
    }

    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.base_url, self.jwks_endpoint)
    }

    pub fn config_url(&self) -> String {
        format!("{}{}", self.base_url, self.config_endpoint)
    }

    pub fn blacklist_url(&self) -> String {
        format!("{}{}", self.base_url, self.blacklist_endpoint)
    }
}

/// Where trust comes from. Chosen once per validator.
#[derive(Debug, Clone)]
pub enum TrustSource {
    Local(LocalSigning),
    Remote(RemoteIssuer),
}

/// Full validator configuration.
#[derive(Debug, Clone)]
pub struct ValidatorSettings {
    pub source: TrustSource,
    pub trust_cache_ttl: Duration,
    pub revocation_cache_ttl: Duration,
    pub http_timeout: Duration,
    /// Leeway in seconds applied when checking `exp`.
    pub clock_skew: u64,
}

impl ValidatorSettings {
    /// Settings for the issuing service, validating with its own secret.
    pub fn local(
        secret: impl Into<String>,
        algorithm: Algorithm,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self::with_source(TrustSource::Local(LocalSigning {
            secret: secret.into(),
            algorithm,
            issuer: issuer.into(),
            audience: audience.into(),
        }))
    }

    /// Settings for a downstream service trusting the issuer at `base_url`.
    pub fn remote(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self::with_source(TrustSource::Remote(RemoteIssuer::new(
            base_url,
        )?)))
    }

    fn with_source(source: TrustSource) -> Self {
        Self {
            source,
            trust_cache_ttl: DEFAULT_TRUST_CACHE_TTL,
            revocation_cache_ttl: DEFAULT_REVOCATION_CACHE_TTL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            clock_skew: 0,
        }
    }

    pub fn with_trust_cache_ttl(mut self, ttl: Duration) -> Self {
        self.trust_cache_ttl = ttl;
        self
    }

    pub fn with_revocation_cache_ttl(mut self, ttl: Duration) -> Self {
        self.revocation_cache_ttl = ttl;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_clock_skew(mut self, seconds: u64) -> Self {
        self.clock_skew = seconds;
        self
    }

    pub fn mode(&self) -> ValidationMode {
        match self.source {
            TrustSource::Local(_) => ValidationMode::Local,
            TrustSource::Remote(_) => ValidationMode::Remote,
        }
    }

    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let use_local: bool = env_parse(USE_LOCAL_JWT_ENV, true)?;

        let source = if use_local {
            let algorithm_name = env_or_default(ALGORITHM_ENV, "HS256");
            let algorithm =
                Algorithm::from_str(&algorithm_name).map_err(|e| ConfigError::Invalid {
                    name: ALGORITHM_ENV,
                    reason: e.to_string(),
                })?;
            TrustSource::Local(LocalSigning {
                secret: env_required(SECRET_KEY_ENV)?,
                algorithm,
                issuer: env_or_default(ISSUER_ENV, DEFAULT_ISSUER),
                audience: env_or_default(AUDIENCE_ENV, DEFAULT_AUDIENCE),
            })
        } else {
            let mut issuer = RemoteIssuer::new(&env_required(USER_SERVICE_URL_ENV)?)?;
            issuer.jwks_endpoint = env_or_default(JWKS_ENDPOINT_ENV, DEFAULT_JWKS_ENDPOINT);
            issuer.config_endpoint =
                env_or_default(JWT_CONFIG_ENDPOINT_ENV, DEFAULT_JWT_CONFIG_ENDPOINT);
            issuer.blacklist_endpoint =
                env_or_default(BLACKLIST_ENDPOINT_ENV, DEFAULT_BLACKLIST_ENDPOINT);
            TrustSource::Remote(issuer)
        };

        Ok(Self {
            source,
            trust_cache_ttl: Duration::from_secs(env_parse(
                CACHE_TTL_ENV,
                DEFAULT_TRUST_CACHE_TTL.as_secs(),
            )?),
            revocation_cache_ttl: Duration::from_secs(env_parse(
                BLACKLIST_CACHE_TTL_ENV,
                DEFAULT_REVOCATION_CACHE_TTL.as_secs(),
            )?),
            http_timeout: Duration::from_secs(env_parse(
                HTTP_TIMEOUT_ENV,
                DEFAULT_HTTP_TIMEOUT.as_secs(),
            )?),
            clock_skew: env_parse(CLOCK_SKEW_ENV, 0)?,
        })
    }
}

fn env_or_default(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn env_parse<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_issuer_trims_trailing_slash() {
        let issuer = RemoteIssuer::new("http://users.internal:8001/").unwrap();
        assert_eq!(issuer.base_url, "http://users.internal:8001");
        assert_eq!(
            issuer.jwks_url(),
            "http://users.internal:8001/api/v1/jwt/.well-known/jwks.json"
        );
        assert_eq!(
            issuer.blacklist_url(),
            "http://users.internal:8001/api/v1/jwt/blacklist"
        );
    }

    #[test]
    fn remote_issuer_rejects_invalid_url() {
        let err = RemoteIssuer::new("not a url").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: USER_SERVICE_URL_ENV,
                ..
            }
        ));
    }

    #[test]
    fn local_settings_use_default_ttls() {
        let settings = ValidatorSettings::local("s3cr3t", Algorithm::HS256, "svc", "microservices");
        assert_eq!(settings.mode(), ValidationMode::Local);
        assert_eq!(settings.trust_cache_ttl, DEFAULT_TRUST_CACHE_TTL);
        assert_eq!(settings.revocation_cache_ttl, DEFAULT_REVOCATION_CACHE_TTL);
        assert_eq!(settings.clock_skew, 0);
    }

    #[test]
    fn builder_overrides_ttls() {
        let settings = ValidatorSettings::remote("https://issuer.example.com")
            .unwrap()
            .with_trust_cache_ttl(Duration::from_secs(60))
            .with_revocation_cache_ttl(Duration::from_secs(5))
            .with_clock_skew(30);
        assert_eq!(settings.mode(), ValidationMode::Remote);
        assert_eq!(settings.trust_cache_ttl, Duration::from_secs(60));
        assert_eq!(settings.revocation_cache_ttl, Duration::from_secs(5));
        assert_eq!(settings.clock_skew, 30);
    }

    #[test]
    fn debug_output_redacts_secret() {
        let settings = ValidatorSettings::local("s3cr3t", Algorithm::HS256, "svc", "aud");
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("s3cr3t"));
        assert!(rendered.contains("<redacted>"));
    }
}
