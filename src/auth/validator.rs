// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Public entry point for token validation.
//!
//! ## Blocking vs async
//!
//! - [`TokenValidator::verify`] blocks the calling thread. In remote mode it
//!   drives the pipeline on a small runtime owned by the validator, created
//!   on first use; called from inside a runtime it hands that work to a
//!   short-lived helper thread instead of panicking. In local mode the
//!   revocation store is async-only, so it returns a `USE_ASYNC_PATH`
//!   rejection instead of blocking on it.
//! - [`TokenValidator::verify_async`] never stalls the caller's scheduler. In
//!   remote mode the blocking path is moved to a `spawn_blocking` worker; in
//!   local mode the pipeline runs inline.
//!
//! Dropping a `verify_async` future (cancellation, timeout) yields no outcome.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let settings = ValidatorSettings::from_env()?;
//! let validator = TokenValidator::remote(&settings)?;
//! match validator.verify_async(token).await? {
//!     VerificationOutcome::Valid(claims) => { /* authorized as claims.user_id */ }
//!     VerificationOutcome::Invalid(rejection) => { /* 401 with rejection.error_code */ }
//! }
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::runtime::{Handle, Runtime};

use super::claims::UnverifiedClaims;
use super::inspect;
use super::issuer::IssuerClient;
use super::outcome::{Rejection, VerificationOutcome};
use super::revocation::{RemoteRevocationList, RevocationOracle, RevocationStore};
use super::trust::{KeyMaterial, RemoteTrust, TrustConfig, TrustMaterialProvider};
use super::verifier::Verifier;
use crate::config::{
    ConfigError, TrustSource, ValidationMode, ValidatorSettings, USE_LOCAL_JWT_ENV,
};
use crate::error::{ValidatorError, ValidatorResult};

struct Inner {
    mode: ValidationMode,
    verifier: Verifier,
    issuer: Option<Arc<IssuerClient>>,
    runtime: Mutex<Option<Arc<Runtime>>>,
}

impl Inner {
    fn runtime(&self) -> ValidatorResult<Arc<Runtime>> {
        let mut slot = self.runtime.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(runtime) = slot.as_ref() {
            return Ok(runtime.clone());
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("token-validator-io")
            .enable_all()
            .build()
            .map_err(|e| ValidatorError::Runtime(e.to_string()))?;
        let runtime = Arc::new(runtime);
        *slot = Some(runtime.clone());
        Ok(runtime)
    }

    fn close(&self) {
        if let Some(issuer) = &self.issuer {
            issuer.close();
        }

        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        // Callers still inside `verify` hold their own handle and release it
        // once they return.
        if let Some(runtime) = runtime {
            release(runtime);
        }
    }
}

/// Drop a runtime handle. Whoever holds the last one shuts the runtime down
/// without waiting, which is allowed from any context.
fn release(runtime: Arc<Runtime>) {
    if let Some(runtime) = Arc::into_inner(runtime) {
        runtime.shutdown_background();
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.close();
    }
}

/// Validates bearer tokens under a fixed [`ValidationMode`].
///
/// Cheap to clone; clones share caches and connections.
#[derive(Clone)]
pub struct TokenValidator {
    inner: Arc<Inner>,
}

impl TokenValidator {
    /// Validator for the issuing service: trusts its own secret and asks
    /// `store` about revocations.
    pub fn local(
        settings: &ValidatorSettings,
        store: Arc<dyn RevocationStore>,
    ) -> Result<Self, ConfigError> {
        let TrustSource::Local(signing) = &settings.source else {
            return Err(ConfigError::Invalid {
                name: USE_LOCAL_JWT_ENV,
                reason: "local validator requires local signing settings".to_string(),
            });
        };

        let verifier = Verifier::new(
            TrustMaterialProvider::local(signing),
            RevocationOracle::Local(store),
            settings.clock_skew,
        );
        tracing::info!(issuer = %signing.issuer, "Token validator created in local mode");
        Ok(Self::assemble(ValidationMode::Local, verifier, None))
    }

    /// Validator for downstream services: trusts the remote issuer.
    pub fn remote(settings: &ValidatorSettings) -> Result<Self, ConfigError> {
        let TrustSource::Remote(issuer) = &settings.source else {
            return Err(ConfigError::Invalid {
                name: USE_LOCAL_JWT_ENV,
                reason: "remote validator requires an issuer URL".to_string(),
            });
        };

        let client = Arc::new(IssuerClient::new(issuer.clone(), settings.http_timeout));
        let verifier = Verifier::new(
            TrustMaterialProvider::Remote(RemoteTrust::new(client.clone(), settings)),
            RevocationOracle::Remote(RemoteRevocationList::new(client.clone(), settings)),
            settings.clock_skew,
        );
        tracing::info!(issuer = %issuer.base_url, "Token validator created in remote mode");
        Ok(Self::assemble(ValidationMode::Remote, verifier, Some(client)))
    }

    fn assemble(mode: ValidationMode, verifier: Verifier, issuer: Option<Arc<IssuerClient>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                mode,
                verifier,
                issuer,
                runtime: Mutex::new(None),
            }),
        }
    }

    pub fn mode(&self) -> ValidationMode {
        self.inner.mode
    }

    /// Drive `future` on the owned runtime. The calling thread must not be
    /// driving a runtime itself.
    fn block_on<F: Future>(&self, future: F) -> ValidatorResult<F::Output> {
        let runtime = self.inner.runtime()?;
        let output = runtime.block_on(future);
        release(runtime);
        Ok(output)
    }

    fn verify_remote(&self, token: &str) -> ValidatorResult<VerificationOutcome> {
        self.block_on(self.inner.verifier.verify(token))?
    }

    /// Run the remote pipeline from a scoped helper thread, for callers that
    /// are already inside a runtime where `block_on` would panic.
    fn verify_remote_detached(&self, token: &str) -> ValidatorResult<VerificationOutcome> {
        std::thread::scope(|scope| {
            let worker = std::thread::Builder::new()
                .name("token-validator-verify".to_string())
                .spawn_scoped(scope, || self.verify_remote(token))
                .map_err(|e| ValidatorError::Runtime(e.to_string()))?;
            worker
                .join()
                .map_err(|_| ValidatorError::Worker("verification thread panicked".to_string()))?
        })
    }

    async fn offload<T, F>(&self, work: F) -> ValidatorResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&TokenValidator) -> ValidatorResult<T> + Send + 'static,
    {
        let validator = self.clone();
        tokio::task::spawn_blocking(move || work(&validator))
            .await
            .map_err(|e| ValidatorError::Worker(e.to_string()))?
    }

    /// Verify a token, blocking the current thread.
    ///
    /// Inside an async task this still works but stalls that task's worker
    /// for the whole call; prefer [`verify_async`](Self::verify_async) there.
    pub fn verify(&self, token: &str) -> ValidatorResult<VerificationOutcome> {
        match self.inner.mode {
            ValidationMode::Local => {
                tracing::warn!("Blocking verification requested in local mode");
                Ok(VerificationOutcome::Invalid(Rejection::use_async_path()))
            }
            ValidationMode::Remote if Handle::try_current().is_ok() => {
                tracing::debug!("Blocking verification called inside a runtime");
                self.verify_remote_detached(token)
            }
            ValidationMode::Remote => self.verify_remote(token),
        }
    }

    /// Verify a token without blocking the caller's scheduler.
    pub async fn verify_async(&self, token: &str) -> ValidatorResult<VerificationOutcome> {
        match self.inner.mode {
            ValidationMode::Local => self.inner.verifier.verify(token).await,
            ValidationMode::Remote => {
                let token = token.to_string();
                self.offload(move |validator| validator.verify_remote(&token))
                    .await
            }
        }
    }

    /// Blocking shorthand: true only for an accepted token.
    ///
    /// Always false in local mode, where [`verify`](Self::verify) rejects.
    pub fn is_valid(&self, token: &str) -> bool {
        matches!(self.verify(token), Ok(VerificationOutcome::Valid(_)))
    }

    /// Current verification key, fetching it if needed.
    pub async fn key_material(&self) -> ValidatorResult<KeyMaterial> {
        match self.inner.mode {
            ValidationMode::Local => self.inner.verifier.trust().key_material().await,
            ValidationMode::Remote => {
                self.offload(|validator| {
                    validator.block_on(validator.inner.verifier.trust().key_material())?
                })
                .await
            }
        }
    }

    /// Current algorithm/issuer/audience, fetching them if needed.
    pub async fn trust_config(&self) -> ValidatorResult<TrustConfig> {
        match self.inner.mode {
            ValidationMode::Local => self.inner.verifier.trust().trust_config().await,
            ValidationMode::Remote => {
                self.offload(|validator| {
                    validator.block_on(validator.inner.verifier.trust().trust_config())?
                })
                .await
            }
        }
    }

    /// Decode claims WITHOUT checking the signature. Diagnostics only.
    pub fn extract_claims_unverified(&self, token: &str) -> ValidatorResult<UnverifiedClaims> {
        inspect::extract_claims_unverified(token)
    }

    /// True if the token is unparsable, has no `exp`, or has expired.
    pub fn is_expired(&self, token: &str) -> bool {
        inspect::is_expired(token)
    }

    /// The token's `exp` claim, regardless of whether it has passed.
    pub fn expiry(&self, token: &str) -> Option<DateTime<Utc>> {
        inspect::expiry(token)
    }

    /// Drop cached trust material and revocation data.
    pub fn invalidate_caches(&self) {
        tracing::info!("Invalidating token validator caches");
        self.inner.verifier.invalidate();
    }

    /// Drop only the cached revocation list.
    pub fn invalidate_revocation_cache(&self) {
        self.inner.verifier.invalidate_revocation();
    }

    /// Release the issuer connection and the blocking runtime. Idempotent;
    /// a later call re-creates them on demand.
    pub fn close(&self) {
        self.inner.close();
    }
}
