// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP access to the trusted token issuer.
//!
//! The underlying `reqwest::Client` is created on first use and released by
//! [`IssuerClient::close`]; a later request creates a fresh one.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::config::RemoteIssuer;
use crate::error::{ValidatorError, ValidatorResult};

pub struct IssuerClient {
    issuer: RemoteIssuer,
    timeout: Duration,
    client: Mutex<Option<reqwest::Client>>,
}

impl IssuerClient {
    pub fn new(issuer: RemoteIssuer, timeout: Duration) -> Self {
        Self {
            issuer,
            timeout,
            client: Mutex::new(None),
        }
    }

    pub fn issuer(&self) -> &RemoteIssuer {
        &self.issuer
    }

    fn client(&self, url: &str) -> ValidatorResult<reqwest::Client> {
        let mut slot = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ValidatorError::unavailable(url, None, e.to_string()))?;
        *slot = Some(client.clone());
        Ok(client)
    }

    /// GET `url` and decode the JSON body.
    ///
    /// Transport errors, non-2xx statuses and undecodable bodies all surface
    /// as `TrustMaterialUnavailable` carrying the URL (and status when known).
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> ValidatorResult<T> {
        let client = self.client(url)?;

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| ValidatorError::unavailable(url, None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ValidatorError::unavailable(
                url,
                Some(status.as_u16()),
                format!("HTTP {status} from issuer"),
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ValidatorError::unavailable(url, Some(status.as_u16()), e.to_string()))
    }

    /// Drop the HTTP client and its pooled connections. Idempotent.
    pub fn close(&self) {
        let mut slot = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.take().is_some() {
            tracing::debug!(issuer = %self.issuer.base_url, "issuer client closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_open(client: &IssuerClient) -> bool {
        client.client.lock().unwrap().is_some()
    }

    fn issuer_client() -> IssuerClient {
        IssuerClient::new(
            RemoteIssuer::new("http://127.0.0.1:9").unwrap(),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn client_is_created_lazily_and_closed_idempotently() {
        let client = issuer_client();
        assert!(!is_open(&client));

        client.client("http://127.0.0.1:9/x").unwrap();
        assert!(is_open(&client));

        client.close();
        client.close();
        assert!(!is_open(&client));
    }

    #[tokio::test]
    async fn transport_error_is_trust_material_unavailable() {
        let client = issuer_client();
        let url = client.issuer().jwks_url();
        let err = client.get_json::<serde_json::Value>(&url).await.unwrap_err();
        match err {
            ValidatorError::TrustMaterialUnavailable {
                url: failed, status, ..
            } => {
                assert_eq!(failed, url);
                assert_eq!(status, None);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
