// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The verification pipeline.
//!
//! Stages run strictly in order and the first failure ends the run:
//!
//! 1. **Signature**: decode and verify against the trust material (algorithm,
//!    key, issuer, audience, `exp` required and unexpired, `iat` consistent).
//! 2. **Claims shape**: `sub`, `username` and `roles` present, `roles` a list.
//! 3. **Semantics**: account active, token type is `access` when present.
//! 4. **Revocation**: token not revoked.
//!
//! A token that fails an early stage is never looked at by a later one; in
//! particular a token with a bad signature never reaches the revocation check.

use jsonwebtoken::{decode, Validation};
use serde_json::{Map, Value};

use super::claims::{timestamp, TokenClaims, ACCESS_TOKEN_TYPE};
use super::outcome::{Rejection, VerificationOutcome};
use super::revocation::RevocationOracle;
use super::trust::TrustMaterialProvider;
use crate::error::{ValidatorError, ValidatorResult};

/// Why the pipeline stopped early.
enum Halt {
    Rejected(Rejection),
    Failed(ValidatorError),
}

impl From<Rejection> for Halt {
    fn from(rejection: Rejection) -> Self {
        Halt::Rejected(rejection)
    }
}

impl From<ValidatorError> for Halt {
    fn from(error: ValidatorError) -> Self {
        match error {
            ValidatorError::NoUsableKey => Halt::Rejected(Rejection::no_usable_key()),
            other => Halt::Failed(other),
        }
    }
}

pub struct Verifier {
    trust: TrustMaterialProvider,
    revocation: RevocationOracle,
    /// Leeway in seconds for `exp`.
    clock_skew: u64,
}

impl Verifier {
    pub fn new(trust: TrustMaterialProvider, revocation: RevocationOracle, clock_skew: u64) -> Self {
        Self {
            trust,
            revocation,
            clock_skew,
        }
    }

    pub fn trust(&self) -> &TrustMaterialProvider {
        &self.trust
    }

    /// Run the full pipeline.
    ///
    /// Expected rejections come back as `Ok(Invalid(..))`. `Err` means trust
    /// could not be established at all (issuer unreachable, revocation store
    /// failure in local mode).
    pub async fn verify(&self, token: &str) -> ValidatorResult<VerificationOutcome> {
        match self.run(token).await {
            Ok(claims) => {
                tracing::debug!(user_id = %claims.user_id, "Token accepted");
                Ok(VerificationOutcome::Valid(claims))
            }
            Err(Halt::Rejected(rejection)) => {
                tracing::warn!(
                    error_code = %rejection.error_code,
                    reason = rejection.reason,
                    message = %rejection.message,
                    "Token rejected"
                );
                Ok(VerificationOutcome::Invalid(rejection))
            }
            Err(Halt::Failed(error)) => {
                tracing::error!(
                    error_code = %error.error_code(),
                    error = %error,
                    "Token verification failed"
                );
                Err(error)
            }
        }
    }

    async fn run(&self, token: &str) -> Result<TokenClaims, Halt> {
        let payload = self.check_signature(token).await?;
        let claims = TokenClaims::from_payload(&payload)?;
        check_semantics(&claims)?;
        self.check_revocation(token).await?;
        Ok(claims)
    }

    async fn check_signature(&self, token: &str) -> Result<Map<String, Value>, Halt> {
        let config = self.trust.trust_config().await?;
        let key = self.trust.key_material().await?;

        let mut validation = Validation::new(config.algorithm);
        validation.leeway = self.clock_skew;

        let mut required = vec!["exp"];
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
            required.push("iss");
        }
        validation.set_required_spec_claims(&required);

        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let payload = decode::<Map<String, Value>>(token, &key.decoding_key(), &validation)
            .map_err(Rejection::jwt_decode)?
            .claims;

        check_issued_at(&payload)?;
        Ok(payload)
    }

    async fn check_revocation(&self, token: &str) -> Result<(), Halt> {
        if self.revocation.is_revoked(token).await? {
            return Err(Rejection::blacklisted().into());
        }
        Ok(())
    }

    /// Drop all cached trust material and revocation data.
    pub fn invalidate(&self) {
        self.trust.invalidate();
        self.revocation.invalidate();
    }

    pub fn invalidate_revocation(&self) {
        self.revocation.invalidate();
    }
}

/// `iat`, when present, must be a NumericDate no later than `exp`.
fn check_issued_at(payload: &Map<String, Value>) -> Result<(), Rejection> {
    let Some(raw) = payload.get("iat") else {
        return Ok(());
    };
    let issued_at = timestamp(raw).ok_or_else(|| Rejection::jwt_decode("iat must be a number"))?;
    let expires_at = payload
        .get("exp")
        .and_then(timestamp)
        .ok_or_else(|| Rejection::jwt_decode("exp must be a number"))?;

    if issued_at > expires_at {
        return Err(Rejection::jwt_decode("iat is later than exp"));
    }
    Ok(())
}

fn check_semantics(claims: &TokenClaims) -> Result<(), Rejection> {
    if !claims.is_active {
        return Err(Rejection::user_inactive(&claims.user_id));
    }
    match claims.token_type.as_deref() {
        Some(actual) if actual != ACCESS_TOKEN_TYPE => {
            Err(Rejection::invalid_token_type(ACCESS_TOKEN_TYPE, actual))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::revocation::{InMemoryRevocationStore, RevocationStore, StoreError};
    use crate::auth::ErrorCode;
    use crate::config::LocalSigning;
    use async_trait::async_trait;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use serde_json::json;
    use std::sync::Arc;

    const SECRET: &str = "s3cr3t";

    struct FailingStore;

    #[async_trait]
    impl RevocationStore for FailingStore {
        async fn is_revoked(&self, _token: &str) -> Result<bool, StoreError> {
            Err(StoreError("store offline".into()))
        }
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn sign(claims: Value, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn base_claims() -> Value {
        json!({
            "sub": "u1",
            "username": "alice",
            "roles": ["admin"],
            "exp": now() + 3600,
            "iat": now(),
            "iss": "svc",
            "aud": "microservices"
        })
    }

    fn with(mut claims: Value, key: &str, value: Value) -> Value {
        claims[key] = value;
        claims
    }

    fn without(mut claims: Value, key: &str) -> Value {
        claims.as_object_mut().unwrap().remove(key);
        claims
    }

    fn verifier(store: Arc<dyn RevocationStore>) -> Verifier {
        let signing = LocalSigning {
            secret: SECRET.into(),
            algorithm: Algorithm::HS256,
            issuer: "svc".into(),
            audience: "microservices".into(),
        };
        Verifier::new(
            TrustMaterialProvider::local(&signing),
            RevocationOracle::Local(store),
            0,
        )
    }

    async fn outcome(claims: Value) -> VerificationOutcome {
        verifier(Arc::new(InMemoryRevocationStore::new()))
            .verify(&sign(claims, SECRET))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn accepts_valid_token() {
        let result = outcome(base_claims()).await;
        let claims = result.claims().expect("token should be accepted");
        assert_eq!(claims.user_id, "u1");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.roles, vec!["admin"]);
        assert!(claims.is_active);
        assert!(!claims.is_superuser);
    }

    #[tokio::test]
    async fn wrong_secret_is_decode_error() {
        let token = sign(base_claims(), "other-secret");
        let result = verifier(Arc::new(InMemoryRevocationStore::new()))
            .verify(&token)
            .await
            .unwrap();
        assert_eq!(result.error_code(), Some(ErrorCode::JwtDecodeError));
    }

    #[tokio::test]
    async fn expired_token_is_decode_error() {
        let claims = with(base_claims(), "exp", json!(now() - 3600));
        let claims = with(claims, "iat", json!(now() - 7200));
        assert_eq!(
            outcome(claims).await.error_code(),
            Some(ErrorCode::JwtDecodeError)
        );
    }

    #[tokio::test]
    async fn token_without_exp_is_rejected() {
        let claims = without(without(base_claims(), "exp"), "iat");
        assert_eq!(
            outcome(claims).await.error_code(),
            Some(ErrorCode::JwtDecodeError)
        );
    }

    #[tokio::test]
    async fn iat_after_exp_is_rejected() {
        let claims = with(base_claims(), "iat", json!(now() + 7200));
        assert_eq!(
            outcome(claims).await.error_code(),
            Some(ErrorCode::JwtDecodeError)
        );
    }

    #[tokio::test]
    async fn issuer_and_audience_mismatch_are_rejected() {
        let claims = with(base_claims(), "iss", json!("someone-else"));
        assert_eq!(
            outcome(claims).await.error_code(),
            Some(ErrorCode::JwtDecodeError)
        );

        let claims = with(base_claims(), "aud", json!("billing"));
        assert_eq!(
            outcome(claims).await.error_code(),
            Some(ErrorCode::JwtDecodeError)
        );
    }

    #[tokio::test]
    async fn missing_issuer_is_rejected() {
        let claims = without(base_claims(), "iss");
        assert_eq!(
            outcome(claims).await.error_code(),
            Some(ErrorCode::JwtDecodeError)
        );
    }

    #[tokio::test]
    async fn missing_roles_is_missing_field() {
        let result = outcome(without(base_claims(), "roles")).await;
        let rejection = result.rejection().unwrap();
        assert_eq!(rejection.error_code, ErrorCode::MissingRequiredField);
        assert_eq!(rejection.details["missing_field"], "roles");
    }

    #[tokio::test]
    async fn string_roles_is_invalid_field_type() {
        let result = outcome(with(base_claims(), "roles", json!("admin"))).await;
        let rejection = result.rejection().unwrap();
        assert_eq!(rejection.error_code, ErrorCode::InvalidFieldType);
        assert_eq!(rejection.details["field"], "roles");
    }

    #[tokio::test]
    async fn inactive_user_is_rejected() {
        let result = outcome(with(base_claims(), "is_active", json!(false))).await;
        assert_eq!(result.error_code(), Some(ErrorCode::UserInactive));
    }

    #[tokio::test]
    async fn null_is_active_is_rejected() {
        let result = outcome(with(base_claims(), "is_active", json!(null))).await;
        assert_eq!(result.error_code(), Some(ErrorCode::UserInactive));
    }

    #[tokio::test]
    async fn falsy_token_type_is_accepted() {
        let result = outcome(with(base_claims(), "type", json!(false))).await;
        assert!(result.is_valid());
        assert_eq!(result.claims().unwrap().token_type, None);
    }

    #[tokio::test]
    async fn numeric_phone_does_not_reject() {
        let result = outcome(with(base_claims(), "phone", json!(5551234))).await;
        assert_eq!(result.claims().unwrap().phone.as_deref(), Some("5551234"));
    }

    #[tokio::test]
    async fn refresh_token_type_is_rejected() {
        let result = outcome(with(base_claims(), "type", json!("refresh"))).await;
        let rejection = result.rejection().unwrap();
        assert_eq!(rejection.error_code, ErrorCode::InvalidTokenType);
        assert_eq!(rejection.details["actual_type"], "refresh");
    }

    #[tokio::test]
    async fn access_token_type_is_accepted() {
        let result = outcome(with(base_claims(), "type", json!("access"))).await;
        assert_eq!(result.claims().unwrap().token_type.as_deref(), Some("access"));
    }

    #[tokio::test]
    async fn revoked_token_is_blacklisted() {
        let store = Arc::new(InMemoryRevocationStore::new());
        let token = sign(base_claims(), SECRET);
        store.revoke(&token);

        let result = verifier(store).verify(&token).await.unwrap();
        assert_eq!(result.error_code(), Some(ErrorCode::TokenBlacklisted));
    }

    #[tokio::test]
    async fn store_failure_propagates_for_valid_token() {
        let token = sign(base_claims(), SECRET);
        let err = verifier(Arc::new(FailingStore)).verify(&token).await.unwrap_err();
        assert!(matches!(err, ValidatorError::RevocationCheckFailed(_)));
    }

    #[tokio::test]
    async fn bad_signature_never_reaches_revocation() {
        let token = sign(base_claims(), "other-secret");
        let result = verifier(Arc::new(FailingStore)).verify(&token).await.unwrap();
        assert_eq!(result.error_code(), Some(ErrorCode::JwtDecodeError));
    }

    #[tokio::test]
    async fn shape_failure_never_reaches_revocation() {
        let token = sign(without(base_claims(), "username"), SECRET);
        let result = verifier(Arc::new(FailingStore)).verify(&token).await.unwrap();
        assert_eq!(result.error_code(), Some(ErrorCode::MissingRequiredField));
    }
}
