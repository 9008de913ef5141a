//! Shared test utilities for authentication testing.
//!
//! Helpers for generating Ed25519 key pairs, building key records and users,
//! signing tokens from arbitrary JSON, and crafting unsigned tokens for attack
//! tests. Feature-gated behind `testutil` so it never ships in production
//! builds.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! warden-authn = { path = "../authn", features = ["testutil"] }
//! ```
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use warden_authn::testutil::{sign_raw_token, test_key_record_with_private};
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::SigningKey;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rand_core::OsRng;
use warden_storage::{SigningKeyRecord, UserRecord};
use zeroize::Zeroizing;

use crate::{config::PasswordConfig, credentials::PasswordHasher};

/// Generates a test Ed25519 key pair.
///
/// Returns `(pkcs8_der, public_key_base64url)`. The DER is suitable for
/// [`EncodingKey::from_ed_der`]; the public key is the 32 raw bytes encoded as
/// base64url without padding, as [`SigningKeyRecord::public_key`] expects.
pub fn generate_test_keypair() -> (Zeroizing<Vec<u8>>, String) {
    let signing_key = SigningKey::generate(&mut OsRng);
    let public_key_b64 = URL_SAFE_NO_PAD.encode(signing_key.verifying_key().to_bytes());

    let private_bytes: Zeroizing<[u8; 32]> = Zeroizing::new(signing_key.to_bytes());
    let mut pkcs8_der = Zeroizing::new(vec![
        0x30, 0x2e, // SEQUENCE, 46 bytes
        0x02, 0x01, 0x00, // INTEGER version 0
        0x30, 0x05, // SEQUENCE, 5 bytes (algorithm identifier)
        0x06, 0x03, 0x2b, 0x65, 0x70, // OID 1.3.101.112 (Ed25519)
        0x04, 0x22, // OCTET STRING, 34 bytes
        0x04, 0x20, // OCTET STRING, 32 bytes (the seed)
    ]);
    pkcs8_der.extend_from_slice(&*private_bytes);

    (pkcs8_der, public_key_b64)
}

/// Creates an active, verify-only key record with a fresh key pair.
///
/// Returns the private DER alongside so tests can still sign tokens the store
/// will accept.
pub fn test_key_record(kid: &str) -> (Zeroizing<Vec<u8>>, SigningKeyRecord) {
    let (der, public_key) = generate_test_keypair();
    let record = SigningKeyRecord::builder().kid(kid).public_key(public_key).build();
    (der, record)
}

/// Creates an active key record that also carries its private half, so a
/// [`TokenIssuer`](crate::TokenIssuer) can sign with it.
pub fn test_key_record_with_private(kid: &str) -> (Zeroizing<Vec<u8>>, SigningKeyRecord) {
    let (der, public_key) = generate_test_keypair();
    let record = SigningKeyRecord::builder()
        .kid(kid)
        .public_key(public_key)
        .private_key(URL_SAFE_NO_PAD.encode(&*der))
        .build();
    (der, record)
}

/// Signs an arbitrary JSON payload with EdDSA under `kid`.
///
/// Bypasses [`Claims`](crate::Claims) validation, so tests can produce tokens
/// with missing subjects, bogus roles or past expiry.
///
/// # Panics
///
/// Panics if encoding fails.
#[allow(clippy::expect_used)]
pub fn sign_raw_token(pkcs8_der: &[u8], kid: &str, payload: &serde_json::Value) -> String {
    let mut header = Header::new(Algorithm::EdDSA);
    header.kid = Some(kid.to_owned());
    let key = EncodingKey::from_ed_der(pkcs8_der);
    jsonwebtoken::encode(&header, payload, &key).expect("Failed to encode test token")
}

/// Creates a raw token string from arbitrary header and payload JSON.
///
/// The result is `{header_b64}.{payload_b64}.` with an empty signature, useful
/// for `alg: "none"` and algorithm-confusion tests.
///
/// # Panics
///
/// Panics if JSON serialization fails.
#[allow(clippy::expect_used)]
pub fn craft_raw_token(header_json: &serde_json::Value, payload_json: &serde_json::Value) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header_json).expect("header json"));
    let payload_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload_json).expect("payload json"));
    format!("{header_b64}.{payload_b64}.")
}

/// Argon2 parameters cheap enough for unit tests.
pub fn fast_password_config() -> PasswordConfig {
    PasswordConfig::builder().memory_kib(8 * 1024).iterations(1).parallelism(1).build()
}

/// Builds an enabled user whose password hash matches `password` under
/// [`fast_password_config`].
///
/// # Panics
///
/// Panics if hashing fails.
#[allow(clippy::expect_used)]
pub fn test_user(email: &str, password: &str, roles: &[&str]) -> UserRecord {
    let hasher = PasswordHasher::new(&fast_password_config()).expect("test hasher");
    let password_hash = hasher.hash(password).expect("hash test password");
    UserRecord::builder()
        .name(email.split('@').next().unwrap_or(email))
        .email(email)
        .roles(roles.iter().map(|r| (*r).to_owned()).collect())
        .password_hash(password_hash)
        .build()
}

/// Asserts that a [`Result<T, AuthError>`](crate::AuthError) is an `Err`
/// matching the given variant.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use warden_authn::{AuthError, assert_auth_error};
///
/// let result: Result<(), AuthError> = Err(AuthError::Expired);
/// assert_auth_error!(result, Expired);
/// ```
#[macro_export]
macro_rules! assert_auth_error {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!($result, Err($crate::error::AuthError::$variant { .. })),
            "expected AuthError::{}, got: {:?}",
            stringify!($variant),
            $result,
        );
    };
    ($result:expr, $variant:ident, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::AuthError::$variant { .. })),
            "{}: expected AuthError::{}, got: {:?}",
            $msg,
            stringify!($variant),
            $result,
        );
    };
}
