//! Bearer token verification and issuance.
//!
//! Tokens are compact JWS strings (`header.payload.signature`, base64url)
//! signed with Ed25519. The header carries the `kid` that selects the key; the
//! payload is a [`TokenClaims`].
//!
//! # Verification order
//!
//! 1. exactly three segments, decodable header ([`AuthError::Malformed`])
//! 2. `kid` well-formed, `alg` is EdDSA ([`AuthError::Malformed`], [`AuthError::UnsupportedAlgorithm`])
//! 3. key lookup ([`AuthError::UnknownKey`])
//! 4. signature ([`AuthError::BadSignature`])
//! 5. subject ([`AuthError::NoSubject`], [`AuthError::InvalidSubject`]) and claim invariants
//! 6. expiry ([`AuthError::Expired`])
//! 7. issuer ([`AuthError::InvalidIssuer`])
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use warden_authn::{AuthConfig, KeyStore, TokenIssuer, TokenVerifier};
//!
//! # fn example(keys: Arc<KeyStore>, claims: warden_authn::Claims) -> warden_authn::Result<()> {
//! let config = AuthConfig::default();
//! let token = TokenIssuer::new(Arc::clone(&keys)).issue(&claims)?;
//! let verified = TokenVerifier::new(keys, &config).verify(&token)?;
//! assert_eq!(verified, claims);
//! # Ok(())
//! # }
//! ```

use std::{sync::Arc, time::Duration};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, Header, Validation};
use serde::Deserialize;

use crate::{
    claims::{Claims, TokenClaims},
    config::AuthConfig,
    error::{AuthError, Result},
    keys::KeyStore,
    validation::{validate_algorithm, validate_kid},
};

/// Unverified token header.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenHeader {
    /// Signing algorithm name as written in the token.
    pub alg: String,
    /// Key ID.
    #[serde(default)]
    pub kid: Option<String>,
    /// Media type, normally `"JWT"`.
    #[serde(default)]
    pub typ: Option<String>,
}

/// Decodes the header of a compact token without verifying anything.
///
/// The `alg` is kept as a raw string so that values such as `"none"` surface
/// as [`AuthError::UnsupportedAlgorithm`] rather than a parse failure.
///
/// # Errors
///
/// Returns [`AuthError::Malformed`] if the token does not have exactly three
/// dot-separated segments or the header is not base64url JSON.
pub fn decode_token_header(token: &str) -> Result<TokenHeader> {
    let mut segments = token.split('.');
    let (Some(header), Some(_), Some(_), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return Err(AuthError::malformed("token must have 3 segments separated by dots"));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|e| AuthError::malformed(format!("failed to decode token header: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::malformed(format!("failed to parse token header: {e}")))
}

/// Verifies bearer tokens against a [`KeyStore`].
///
/// Verification has no side effects and never blocks on I/O.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    keys: Arc<KeyStore>,
    issuer: String,
    clock_skew: Duration,
}

impl TokenVerifier {
    /// Creates a verifier accepting tokens from `config.issuer()`.
    #[must_use]
    pub fn new(keys: Arc<KeyStore>, config: &AuthConfig) -> Self {
        Self { keys, issuer: config.issuer().to_owned(), clock_skew: config.clock_skew() }
    }

    /// Verifies `token` at the current time.
    ///
    /// # Errors
    ///
    /// See the [module documentation](self) for the order in which failures
    /// are detected.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        self.verify_at(token, Utc::now())
    }

    /// Verifies `token` as of `now`.
    ///
    /// # Errors
    ///
    /// As [`verify`](Self::verify).
    #[tracing::instrument(skip(self, token))]
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims> {
        let result = self.verify_inner(token, now);
        if let Err(e) = &result {
            tracing::info!(error = %e, "bearer token rejected");
        }
        result
    }

    fn verify_inner(&self, token: &str, now: DateTime<Utc>) -> Result<Claims> {
        let header = decode_token_header(token)?;
        let kid = header.kid.ok_or_else(|| AuthError::malformed("token header missing kid"))?;
        validate_kid(&kid)?;
        validate_algorithm(&header.alg)?;

        let key = self.keys.lookup_at(&kid, now)?;

        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        let data = jsonwebtoken::decode::<TokenClaims>(token, &key, &validation)?;

        let claims = Claims::try_from(data.claims)?;
        if claims.is_expired_at(now, self.clock_skew) {
            return Err(AuthError::Expired);
        }
        if claims.issuer() != self.issuer {
            return Err(AuthError::InvalidIssuer(claims.issuer().to_owned()));
        }

        tracing::debug!(kid = %kid, subject = %claims.subject(), "bearer token verified");
        Ok(claims)
    }
}

/// Signs claims into bearer tokens with keys from a [`KeyStore`].
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    keys: Arc<KeyStore>,
}

impl TokenIssuer {
    /// Creates an issuer over `keys`.
    #[must_use]
    pub fn new(keys: Arc<KeyStore>) -> Self {
        Self { keys }
    }

    /// Signs `claims` with the active key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SigningKeyUnavailable`] if there is no active key
    /// with a private half.
    pub fn issue(&self, claims: &Claims) -> Result<String> {
        let key = self.keys.active_signing_key()?;
        sign(claims, &key.kid, &key.key)
    }

    /// Signs `claims` with the key named `kid`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownKey`] if the kid is absent and
    /// [`AuthError::SigningKeyUnavailable`] if it has no private half.
    #[tracing::instrument(skip(self, claims), fields(subject = %claims.subject()))]
    pub fn issue_with_kid(&self, claims: &Claims, kid: &str) -> Result<String> {
        let key = self.keys.signing_key(kid)?;
        sign(claims, &key.kid, &key.key)
    }
}

fn sign(claims: &Claims, kid: &str, key: &jsonwebtoken::EncodingKey) -> Result<String> {
    let mut header = Header::new(Algorithm::EdDSA);
    header.kid = Some(kid.to_owned());
    jsonwebtoken::encode(&header, &claims.to_token_claims(), key)
        .map_err(|e| AuthError::SigningKeyUnavailable(format!("signing failed: {e}")))
}
