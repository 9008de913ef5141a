//! Token header validation.
//!
//! Both checks run on the unverified header, before any key lookup, so an
//! attacker-controlled header never reaches the key store or the signature
//! verifier with an unexpected shape.
//!
//! # Security
//!
//! Only EdDSA is accepted, so algorithm substitution (`none`, HMAC keyed
//! with a public key) fails here. Key ids are length-bounded and limited to
//! a safe character set.

use crate::error::AuthError;

/// The only signing algorithm the key store can verify.
///
/// Everything else is refused before key lookup, including `none` and the
/// HMAC family, which would let a public key double as a shared secret
/// (RFC 8725 §3.1).
pub const ACCEPTED_ALGORITHM: &str = "EdDSA";

/// Checks the `alg` header of an unverified token.
///
/// # Errors
///
/// Returns [`AuthError::UnsupportedAlgorithm`] for anything other than
/// [`ACCEPTED_ALGORITHM`].
///
/// # Examples
///
/// ```
/// use warden_authn::validation::validate_algorithm;
///
/// assert!(validate_algorithm("EdDSA").is_ok());
/// assert!(validate_algorithm("none").is_err());
/// assert!(validate_algorithm("HS256").is_err());
/// ```
pub fn validate_algorithm(alg: &str) -> Result<(), AuthError> {
    match alg {
        ACCEPTED_ALGORITHM => Ok(()),
        "none" => Err(AuthError::UnsupportedAlgorithm("unsigned token (alg none)".into())),
        other => Err(AuthError::UnsupportedAlgorithm(format!(
            "{other} is not accepted; tokens must use {ACCEPTED_ALGORITHM}"
        ))),
    }
}

/// Maximum accepted length of a key id.
pub const MAX_KID_LENGTH: usize = 128;

/// Validate a `kid` header value before it is used for key lookup.
///
/// Accepts 1 to [`MAX_KID_LENGTH`] characters from `[A-Za-z0-9._-]`.
///
/// # Errors
///
/// Returns [`AuthError::Malformed`] if the kid is empty, too long, or
/// contains any other character.
///
/// # Examples
///
/// ```
/// use warden_authn::validation::validate_kid;
///
/// assert!(validate_kid("2024-q1.ed25519").is_ok());
/// assert!(validate_kid("../../etc/passwd").is_err());
/// ```
pub fn validate_kid(kid: &str) -> Result<(), AuthError> {
    if kid.is_empty() {
        return Err(AuthError::malformed("kid is empty"));
    }
    if kid.len() > MAX_KID_LENGTH {
        return Err(AuthError::malformed(format!(
            "kid exceeds {MAX_KID_LENGTH} characters"
        )));
    }
    if !kid.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-')) {
        return Err(AuthError::malformed("kid contains invalid characters"));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_validate_algorithm_eddsa_accepted() {
        assert!(validate_algorithm("EdDSA").is_ok());
    }

    #[rstest]
    #[case::unsigned("none")]
    #[case::hmac_256("HS256")]
    #[case::hmac_384("HS384")]
    #[case::hmac_512("HS512")]
    #[case::rsa("RS256")]
    #[case::ecdsa("ES256")]
    #[case::lowercase("eddsa")]
    #[case::empty("")]
    fn test_validate_algorithm_rejected(#[case] alg: &str) {
        assert!(matches!(validate_algorithm(alg), Err(AuthError::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn test_validate_algorithm_names_unsigned_tokens() {
        let result = validate_algorithm("none");
        assert!(matches!(result, Err(AuthError::UnsupportedAlgorithm(ref msg)) if msg.contains("unsigned")));
    }

    #[rstest]
    #[case("k1")]
    #[case("2024-q1.ed25519")]
    #[case("kid_with_underscores")]
    fn test_validate_kid_accepted(#[case] kid: &str) {
        assert!(validate_kid(kid).is_ok());
    }

    #[rstest]
    #[case::empty("")]
    #[case::path_traversal("../keys")]
    #[case::whitespace("kid 1")]
    #[case::unicode("kïd")]
    #[case::null_byte("kid\0")]
    fn test_validate_kid_rejected(#[case] kid: &str) {
        assert!(matches!(validate_kid(kid), Err(AuthError::Malformed(_))));
    }

    #[test]
    fn test_validate_kid_length_bound() {
        assert!(validate_kid(&"a".repeat(MAX_KID_LENGTH)).is_ok());
        assert!(validate_kid(&"a".repeat(MAX_KID_LENGTH + 1)).is_err());
    }
}
