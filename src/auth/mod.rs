use crate::error::{RelayError, Result};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// Whether inbound requests must present the relay's bearer credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthPolicy {
    /// Require `Authorization: Bearer <token>` matching the configured secret
    #[default]
    RequireBearer,
    /// Accept any caller without credentials
    Open,
}

/// How caller credentials are carried to the upstream target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CredentialForwarding {
    /// Honor `X-Target-Authorization` as the upstream `Authorization` value
    #[default]
    OverrideHeader,
    /// Never attach any credential to the outbound request
    Strip,
}

/// Validator for the relay's own bearer credential
#[derive(Clone)]
pub struct BearerValidator {
    secret: SecretString,
}

impl BearerValidator {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Validate the `Authorization` header against the configured secret.
    ///
    /// Runs before target resolution and before any outbound call: no
    /// request reaches the network without a valid token.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<()> {
        let token = extract_bearer(headers)?;
        if !digests_match(token, self.secret.expose_secret()) {
            return Err(RelayError::InvalidToken);
        }
        Ok(())
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header
fn extract_bearer(headers: &HeaderMap) -> Result<&str> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(RelayError::MissingCredentials)?;
    let value = value
        .to_str()
        .map_err(|_| RelayError::MissingCredentials)?;
    value
        .strip_prefix("Bearer ")
        .ok_or(RelayError::MissingCredentials)
}

/// Compare a presented token against the secret via SHA-256 digests.
///
/// Hashing both sides first keeps the comparison time independent of how
/// much of the token prefix matches.
fn digests_match(presented: &str, secret: &str) -> bool {
    let presented = Sha256::digest(presented.as_bytes());
    let secret = Sha256::digest(secret.as_bytes());
    presented == secret
}
