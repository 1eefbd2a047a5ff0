// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `token-validator` - check a bearer token from the command line.
//!
//! ```text
//! token-validator verify <token>    # exit 0 accepted, 1 rejected, 2 error
//! token-validator inspect <token>   # unverified claims, for debugging
//! ```
//!
//! Settings are read from the environment (see `config`).

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use identity_token_validator::logging::{self, LogFormat};
use identity_token_validator::{
    InMemoryRevocationStore, TokenValidator, ValidationMode, ValidatorResult, ValidatorSettings,
    VerificationOutcome,
};
use serde_json::{json, Value};

const USAGE: &str = "usage: token-validator <verify|inspect> <token>";

fn build_validator(settings: &ValidatorSettings) -> Result<TokenValidator, String> {
    let validator = match settings.mode() {
        // No shared store is reachable from here; see `report`.
        ValidationMode::Local => {
            TokenValidator::local(settings, Arc::new(InMemoryRevocationStore::new()))
        }
        ValidationMode::Remote => TokenValidator::remote(settings),
    };
    validator.map_err(|e| e.to_string())
}

/// JSON report and exit status for a verification result.
///
/// Local mode here runs against an empty in-process store, so the report
/// says that revocation was not checked.
fn report(result: &ValidatorResult<VerificationOutcome>, mode: ValidationMode) -> (Value, u8) {
    let revocation_checked = mode == ValidationMode::Remote;
    match result {
        Ok(VerificationOutcome::Valid(claims)) => (
            json!({ "valid": true, "revocation_checked": revocation_checked, "claims": claims }),
            0,
        ),
        Ok(VerificationOutcome::Invalid(rejection)) => (
            json!({
                "valid": false,
                "revocation_checked": revocation_checked,
                "rejection": rejection,
            }),
            1,
        ),
        Err(e) => (
            json!({ "valid": false, "error_code": e.error_code(), "error": e.to_string() }),
            2,
        ),
    }
}

async fn verify(validator: &TokenValidator, token: &str) -> ExitCode {
    let result = validator.verify_async(token).await;
    validator.close();

    if validator.mode() == ValidationMode::Local {
        tracing::warn!("Local mode CLI has no revocation store; revocation was not checked");
    }
    let (output, status) = report(&result, validator.mode());
    println!("{output}");
    ExitCode::from(status)
}

fn inspect(validator: &TokenValidator, token: &str) -> ExitCode {
    match validator.extract_claims_unverified(token) {
        Ok(claims) => {
            let output = json!({
                "verified": false,
                "claims": claims,
                "expires_at": validator.expiry(token).map(|at| at.to_rfc3339()),
                "expired": validator.is_expired(token),
            });
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(2)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init(LogFormat::from_env());

    let args: Vec<String> = env::args().skip(1).collect();
    let (command, token) = match args.as_slice() {
        [command, token] => (command.as_str(), token.as_str()),
        _ => {
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };

    let settings = match ValidatorSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::from(2);
        }
    };

    let validator = match build_validator(&settings) {
        Ok(validator) => validator,
        Err(e) => {
            tracing::error!(error = %e, "Could not create validator");
            return ExitCode::from(2);
        }
    };

    match command {
        "verify" => verify(&validator, token).await,
        "inspect" => inspect(&validator, token),
        _ => {
            eprintln!("{USAGE}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use identity_token_validator::{Rejection, ValidatorError};

    #[test]
    fn local_report_flags_unchecked_revocation() {
        let rejected = Ok(VerificationOutcome::Invalid(Rejection::blacklisted()));
        let (output, status) = report(&rejected, ValidationMode::Local);
        assert_eq!(status, 1);
        assert_eq!(output["revocation_checked"], false);
        assert_eq!(output["rejection"]["error_code"], "TOKEN_BLACKLISTED");

        let (output, _) = report(&rejected, ValidationMode::Remote);
        assert_eq!(output["revocation_checked"], true);
    }

    #[test]
    fn errors_exit_with_status_two() {
        let failed = Err(ValidatorError::NoUsableKey);
        let (output, status) = report(&failed, ValidationMode::Remote);
        assert_eq!(status, 2);
        assert_eq!(output["error_code"], "NO_USABLE_KEY");
    }
}
