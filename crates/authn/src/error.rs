//! Authentication and authorization error types.
//!
//! Every failure in this crate is an [`AuthError`]. Each variant belongs to one
//! [`ErrorClass`], and the class alone decides the HTTP status and the message
//! a caller sees. The `Display` text carries the internal detail (which rule,
//! which roles, which key) and is meant for server-side logs only.

use http::StatusCode;
use thiserror::Error;
use warden_storage::StorageError;

/// Public message for every authentication failure.
pub const UNAUTHENTICATED_MESSAGE: &str = "unauthenticated";

/// Public message for every authorization failure.
pub const NOT_AUTHORIZED_MESSAGE: &str = "not authorized";

/// Public message for a malformed resource identifier.
pub const INVALID_ID_MESSAGE: &str = "ID is not in its proper form";

/// Public message for backend failures.
pub const INTERNAL_MESSAGE: &str = "internal error";

/// Authentication and authorization errors.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`. New variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// No `Authorization` header was presented.
    #[error("Missing credentials")]
    MissingCredentials,

    /// Header or token structure cannot be parsed.
    #[error("Malformed: {0}")]
    Malformed(String),

    /// Token header names an algorithm other than EdDSA.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Token references a key id the key store does not hold.
    #[error("Unknown signing key: {kid}")]
    UnknownKey {
        /// Key ID from the token header.
        kid: String,
    },

    /// Signature does not verify under the selected key.
    #[error("Invalid signature")]
    BadSignature,

    /// Token `exp` has passed.
    #[error("Token expired")]
    Expired,

    /// Token carries no `sub` claim, or an empty one.
    #[error("Token has no subject")]
    NoSubject,

    /// Token `sub` is not a UUID.
    #[error("Invalid subject: {0}")]
    InvalidSubject(String),

    /// Token `iss` is not the configured issuer.
    #[error("Invalid issuer: {0}")]
    InvalidIssuer(String),

    /// Claims are internally inconsistent (`exp <= iat`, empty or unknown roles).
    #[error("Invalid claims: {0}")]
    InvalidClaims(String),

    /// Email or password did not match a usable account.
    ///
    /// Deliberately identical for unknown user, wrong password and disabled
    /// account.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Basic credential is not a well-formed `email:password` pair.
    #[error("Invalid credential format: {0}")]
    InvalidCredentialFormat(String),

    /// Resource path parameter is not a UUID.
    #[error("Invalid ID: {0}")]
    InvalidId(String),

    /// Resource named by the path does not exist.
    #[error("{kind} not found: {id}")]
    ResourceNotFound {
        /// Resource kind, e.g. `"product"`.
        kind: &'static str,
        /// Requested identifier.
        id: String,
    },

    /// Rule engine denied the request.
    #[error("Insufficient privilege: {reason}")]
    InsufficientPrivilege {
        /// Internal denial reason (roles held, rule required).
        reason: String,
    },

    /// Public key material is not a valid Ed25519 key.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Key set rejected at load or rotation time.
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// No private key is available for signing.
    #[error("Signing key unavailable: {0}")]
    SigningKeyUnavailable(String),

    /// Caller cancelled the request before the stage completed.
    #[error("Request cancelled")]
    Cancelled,

    /// A collaborator store failed.
    ///
    /// Wraps the original [`StorageError`] to preserve the full error source
    /// chain for debugging and structured logging.
    #[error("Backend error: {0}")]
    Backend(
        /// The underlying storage error.
        #[source]
        StorageError,
    ),
}

/// Coarse class of an [`AuthError`], deciding what a caller is told.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Identity could not be established.
    Unauthenticated,
    /// Identity established but access denied.
    Unauthorized,
    /// Request is structurally invalid.
    BadRequest,
    /// Something failed on our side.
    Internal,
}

impl ErrorClass {
    /// HTTP status for this class.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::Unauthenticated | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the caller.
    #[must_use]
    pub const fn public_message(self) -> &'static str {
        match self {
            Self::Unauthenticated => UNAUTHENTICATED_MESSAGE,
            Self::Unauthorized => NOT_AUTHORIZED_MESSAGE,
            Self::BadRequest => INVALID_ID_MESSAGE,
            Self::Internal => INTERNAL_MESSAGE,
        }
    }
}

impl AuthError {
    /// Creates a `Malformed` error.
    #[must_use]
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::Malformed(detail.into())
    }

    /// Creates an `UnknownKey` error.
    #[must_use]
    pub fn unknown_key(kid: impl Into<String>) -> Self {
        Self::UnknownKey { kid: kid.into() }
    }

    /// Creates an `InvalidClaims` error.
    #[must_use]
    pub fn invalid_claims(detail: impl Into<String>) -> Self {
        Self::InvalidClaims(detail.into())
    }

    /// Creates an `InvalidKeyMaterial` error.
    #[must_use]
    pub fn invalid_key_material(detail: impl Into<String>) -> Self {
        Self::InvalidKeyMaterial(detail.into())
    }

    /// Creates a `ResourceNotFound` error.
    #[must_use]
    pub fn resource_not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::ResourceNotFound { kind, id: id.to_string() }
    }

    /// Creates an `InsufficientPrivilege` error.
    #[must_use]
    pub fn insufficient_privilege(reason: impl Into<String>) -> Self {
        Self::InsufficientPrivilege { reason: reason.into() }
    }

    /// Creates a `Backend(Timeout)` error.
    #[must_use]
    pub fn timeout() -> Self {
        Self::Backend(StorageError::timeout())
    }

    /// Returns the class of this error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingCredentials
            | Self::Malformed(_)
            | Self::UnsupportedAlgorithm(_)
            | Self::UnknownKey { .. }
            | Self::BadSignature
            | Self::Expired
            | Self::NoSubject
            | Self::InvalidSubject(_)
            | Self::InvalidIssuer(_)
            | Self::InvalidClaims(_)
            | Self::InvalidCredentials
            | Self::InvalidCredentialFormat(_) => ErrorClass::Unauthenticated,
            Self::ResourceNotFound { .. } | Self::InsufficientPrivilege { .. } => {
                ErrorClass::Unauthorized
            },
            Self::InvalidId(_) => ErrorClass::BadRequest,
            Self::InvalidPublicKey(_)
            | Self::InvalidKeyMaterial(_)
            | Self::SigningKeyUnavailable(_)
            | Self::Cancelled
            | Self::Backend(_) => ErrorClass::Internal,
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.class().status()
    }

    /// Message safe to return to the caller.
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        self.class().public_message()
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => AuthError::BadSignature,
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                AuthError::UnsupportedAlgorithm("Algorithm not supported".into())
            },
            ErrorKind::InvalidIssuer => AuthError::InvalidIssuer("Issuer validation failed".into()),
            ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidKeyFormat => {
                AuthError::InvalidPublicKey("Key rejected by verifier".into())
            },
            ErrorKind::InvalidToken => AuthError::malformed("Invalid token structure"),
            ErrorKind::Base64(_) => AuthError::malformed("Invalid base64url segment"),
            ErrorKind::Json(_) => AuthError::malformed("Invalid JSON segment"),
            ErrorKind::Utf8(_) => AuthError::malformed("Invalid UTF-8 segment"),
            _ => AuthError::malformed(format!("JWT error: {err}")),
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        AuthError::Backend(err)
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// A field failed validation.
    #[error("Invalid {field}: {reason}")]
    Invalid {
        /// Field name.
        field: &'static str,
        /// What was wrong.
        reason: String,
    },
}

impl ConfigError {
    /// Creates an `Invalid` error for `field`.
    #[must_use]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid { field, reason: reason.into() }
    }
}
