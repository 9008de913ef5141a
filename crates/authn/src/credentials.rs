//! Email and password authentication.
//!
//! [`CredentialVerifier`] checks a login address and password against the
//! stored user record and, on success, issues fresh [`Claims`]. Passwords are
//! stored as Argon2id PHC strings and compared in constant time.
//!
//! Unknown user, wrong password and disabled account all fail with the same
//! [`AuthError::InvalidCredentials`]. An unknown user still costs one hash
//! verification so the three cases take comparable time.

use std::{sync::Arc, time::Duration};

use argon2::{
    Algorithm, Argon2, Version,
    password_hash::{
        self, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
    },
};
use chrono::Utc;
use rand_core::OsRng;
use warden_storage::{StorageError, UserRecord, UserStore};
use zeroize::Zeroizing;

use crate::{
    claims::{Claims, parse_roles},
    config::{AuthConfig, PasswordConfig},
    error::{AuthError, ConfigError, Result},
};

/// Maximum length of a login address (RFC 5321 path limit).
pub const MAX_EMAIL_LENGTH: usize = 254;

const MAX_LOCAL_PART_LENGTH: usize = 64;

/// Password whose hash stands in for a missing user record.
const DUMMY_PASSWORD: &str = "warden-dummy-password";

/// Checks that `input` is a plain `local@domain` address and returns it trimmed.
///
/// # Errors
///
/// Returns [`AuthError::InvalidCredentialFormat`] if the address is empty,
/// too long, lacks exactly one `@`, or has an empty or ill-formed part.
///
/// # Examples
///
/// ```
/// use warden_authn::credentials::parse_email;
///
/// assert_eq!(parse_email(" user@example.com ").unwrap(), "user@example.com");
/// assert!(parse_email("user.example.com").is_err());
/// ```
pub fn parse_email(input: &str) -> Result<&str> {
    let email = input.trim();
    let invalid = |reason: &str| AuthError::InvalidCredentialFormat(reason.to_owned());

    if email.is_empty() {
        return Err(invalid("empty email"));
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(invalid("email too long"));
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(invalid("email missing @"));
    };
    if domain.contains('@') {
        return Err(invalid("email has more than one @"));
    }
    if local.is_empty() || local.len() > MAX_LOCAL_PART_LENGTH {
        return Err(invalid("bad local part"));
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return Err(invalid("bad local part"));
    }
    if !local.chars().all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-/=?^_`{|}~.".contains(c)) {
        return Err(invalid("bad local part"));
    }
    if domain.split('.').count() < 2
        || !domain.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
    {
        return Err(invalid("bad domain"));
    }
    Ok(email)
}

/// Argon2id password hashing with configured cost.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: argon2::Params,
}

impl PasswordHasher {
    /// Creates a hasher with the given cost.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if argon2 rejects the parameters.
    pub fn new(config: &PasswordConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self { params: config.to_params()? })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hashes `password` with a fresh random salt into a PHC string.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Backend`] if hashing fails.
    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| AuthError::Backend(StorageError::internal_with_source("hashing password", e)))
    }

    /// Checks `password` against a stored PHC string in constant time.
    ///
    /// The cost parameters embedded in `phc` are used, so hashes made under an
    /// older configuration still verify.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Backend`] if the stored hash cannot be parsed.
    pub fn verify(&self, password: &str, phc: &str) -> Result<bool> {
        let parsed = PasswordHash::new(phc).map_err(|e| {
            AuthError::Backend(StorageError::serialization_with_source("stored password hash", e))
        })?;
        match self.argon2().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::Backend(StorageError::internal_with_source(
                "verifying password",
                e,
            ))),
        }
    }
}

/// Authenticates email/password pairs against a [`UserStore`].
pub struct CredentialVerifier {
    users: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    dummy_hash: Arc<str>,
    issuer: String,
    ttl: Duration,
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl CredentialVerifier {
    /// Creates a verifier issuing claims per `config`.
    ///
    /// Computes one dummy hash up front, which costs one Argon2 run.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Backend`] if the password configuration is
    /// rejected or the dummy hash cannot be computed.
    pub fn new(users: Arc<dyn UserStore>, config: &AuthConfig) -> Result<Self> {
        let hasher = PasswordHasher::new(&config.password()).map_err(|e| {
            AuthError::Backend(StorageError::internal_with_source("password configuration", e))
        })?;
        let dummy_hash = hasher.hash(DUMMY_PASSWORD)?.into();
        Ok(Self {
            users,
            hasher,
            dummy_hash,
            issuer: config.issuer().to_owned(),
            ttl: config.token_ttl(),
        })
    }

    /// The hasher this verifier checks passwords with.
    #[must_use]
    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// Verifies `email` and `password`, returning freshly issued claims.
    ///
    /// Claims carry `issued_at = now`, `expires_at = now + token_ttl`, the
    /// configured issuer, and the roles stored on the user record.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidCredentialFormat`] for a malformed email
    /// - [`AuthError::InvalidCredentials`] for an unknown user, wrong password,
    ///   disabled account, or an account with no roles
    /// - [`AuthError::Backend`] if the user store fails or the stored record is corrupt
    #[tracing::instrument(skip(self, password))]
    pub async fn verify(&self, email: &str, password: &str) -> Result<Claims> {
        let email = parse_email(email)?;
        let user = self.users.query_by_email(email).await?;

        let stored_hash = match &user {
            Some(u) => Arc::from(u.password_hash.as_str()),
            None => Arc::clone(&self.dummy_hash),
        };
        let matched = self.verify_blocking(password, stored_hash).await?;

        let Some(user) = user else {
            tracing::info!("login rejected: unknown user");
            return Err(AuthError::InvalidCredentials);
        };
        if !matched {
            tracing::info!(user_id = %user.id, "login rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }
        if !user.enabled {
            tracing::info!(user_id = %user.id, "login rejected: account disabled");
            return Err(AuthError::InvalidCredentials);
        }

        self.claims_for(&user)
    }

    async fn verify_blocking(&self, password: &str, stored_hash: Arc<str>) -> Result<bool> {
        let hasher = self.hasher.clone();
        let password = Zeroizing::new(password.to_owned());
        tokio::task::spawn_blocking(move || hasher.verify(&password, &stored_hash))
            .await
            .map_err(|e| {
                AuthError::Backend(StorageError::internal_with_source("password task failed", e))
            })?
    }

    fn claims_for(&self, user: &UserRecord) -> Result<Claims> {
        let roles = parse_roles(&user.roles).map_err(|e| {
            AuthError::Backend(StorageError::serialization_with_source(
                format!("user {} has a corrupt role list", user.id),
                e,
            ))
        })?;
        if roles.is_empty() {
            tracing::info!(user_id = %user.id, "login rejected: no roles");
            return Err(AuthError::InvalidCredentials);
        }
        Claims::issue(user.id, roles, self.issuer.clone(), Utc::now(), self.ttl)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use rstest::rstest;
    use warden_storage::MemoryUserStore;

    use super::*;
    use crate::{
        assert_auth_error,
        claims::Role,
        testutil::{fast_password_config, test_user},
    };

    fn verifier(users: &MemoryUserStore) -> CredentialVerifier {
        let config = AuthConfig::builder().password(fast_password_config()).build().unwrap();
        CredentialVerifier::new(Arc::new(users.clone()), &config).unwrap()
    }

    #[rstest]
    #[case("user@example.com")]
    #[case("first.last+tag@sub.example.co")]
    #[case("admin@example.com")]
    fn test_parse_email_accepts(#[case] input: &str) {
        assert_eq!(parse_email(input).unwrap(), input);
    }

    #[rstest]
    #[case::empty("")]
    #[case::no_at("user.example.com")]
    #[case::two_at("a@b@example.com")]
    #[case::empty_local("@example.com")]
    #[case::empty_domain("user@")]
    #[case::single_label("user@localhost")]
    #[case::space("us er@example.com")]
    #[case::double_dot("a..b@example.com")]
    #[case::empty_label("user@example..com")]
    fn test_parse_email_rejects(#[case] input: &str) {
        assert_auth_error!(parse_email(input), InvalidCredentialFormat);
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = PasswordHasher::new(&fast_password_config()).unwrap();
        let phc = hasher.hash("gophers").unwrap();

        assert!(phc.starts_with("$argon2id$"));
        assert!(hasher.verify("gophers", &phc).unwrap());
        assert!(!hasher.verify("Gophers", &phc).unwrap());
    }

    #[test]
    fn test_hash_is_salted() {
        let hasher = PasswordHasher::new(&fast_password_config()).unwrap();
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[test]
    fn test_verify_corrupt_hash_is_backend_error() {
        let hasher = PasswordHasher::new(&fast_password_config()).unwrap();
        assert_auth_error!(hasher.verify("pw", "plaintext-password"), Backend);
    }

    #[tokio::test]
    async fn test_verify_success_issues_claims() {
        let users = MemoryUserStore::new();
        let user = test_user("user@example.com", "gophers", &["USER"]);
        users.insert(user.clone()).unwrap();
        let verifier = verifier(&users);

        let claims = verifier.verify("user@example.com", "gophers").await.unwrap();

        assert_eq!(claims.subject(), user.id);
        assert!(claims.has_role(Role::User));
        assert!(!claims.has_role(Role::Admin));
        assert_eq!(claims.issuer(), "warden");
        assert_eq!((claims.expires_at() - claims.issued_at()).num_seconds(), 3600);
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_are_indistinguishable() {
        let users = MemoryUserStore::new();
        users.insert(test_user("user@example.com", "correctpass", &["USER"])).unwrap();
        let verifier = verifier(&users);

        let wrong = verifier.verify("user@example.com", "wrongpass").await.unwrap_err();
        let unknown = verifier.verify("nobody@example.com", "wrongpass").await.unwrap_err();

        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert_eq!(wrong.public_message(), unknown.public_message());
        assert_eq!(wrong.status(), unknown.status());
    }

    #[tokio::test]
    async fn test_disabled_user_rejected() {
        let users = MemoryUserStore::new();
        let mut user = test_user("user@example.com", "gophers", &["USER"]);
        user.enabled = false;
        users.insert(user).unwrap();

        let result = verifier(&users).verify("user@example.com", "gophers").await;
        assert_auth_error!(result, InvalidCredentials);
    }

    #[tokio::test]
    async fn test_user_without_roles_rejected() {
        let users = MemoryUserStore::new();
        users.insert(test_user("user@example.com", "gophers", &[])).unwrap();

        let result = verifier(&users).verify("user@example.com", "gophers").await;
        assert_auth_error!(result, InvalidCredentials);
    }

    #[tokio::test]
    async fn test_unknown_stored_role_is_backend_error() {
        let users = MemoryUserStore::new();
        users.insert(test_user("user@example.com", "gophers", &["SUPERUSER"])).unwrap();

        let result = verifier(&users).verify("user@example.com", "gophers").await;
        assert_auth_error!(result, Backend);
    }

    #[tokio::test]
    async fn test_malformed_email() {
        let users = MemoryUserStore::new();
        let result = verifier(&users).verify("not-an-email", "pw").await;
        assert_auth_error!(result, InvalidCredentialFormat);
    }
}
