//! Configuration for the authentication core.
//!
//! [`AuthConfig`] can be built in code through its validating builder or
//! deserialized from a service config file. Durations use humantime syntax
//! (`"1h"`, `"500ms"`).
//!
//! ```
//! use std::time::Duration;
//! use warden_authn::AuthConfig;
//!
//! let config = AuthConfig::builder()
//!     .issuer("sales-api")
//!     .token_ttl(Duration::from_secs(15 * 60))
//!     .build()?;
//! assert_eq!(config.issuer(), "sales-api");
//! # Ok::<(), warden_authn::ConfigError>(())
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default issuer stamped on credential-issued claims.
pub const DEFAULT_ISSUER: &str = "warden";

/// Default lifetime of credential-issued claims (1 hour).
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// Default expiry tolerance (strict).
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::ZERO;

/// Default bound on backend lookups (5 seconds).
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time a rotated-out key keeps verifying (1 hour).
pub const DEFAULT_ROTATION_GRACE: Duration = Duration::from_secs(60 * 60);

/// Argon2id cost parameters for password hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct PasswordConfig {
    /// Memory cost in KiB.
    #[serde(default = "default_memory_kib")]
    #[builder(default = default_memory_kib())]
    pub memory_kib: u32,

    /// Number of passes.
    #[serde(default = "default_iterations")]
    #[builder(default = default_iterations())]
    pub iterations: u32,

    /// Degree of parallelism.
    #[serde(default = "default_parallelism")]
    #[builder(default = default_parallelism())]
    pub parallelism: u32,
}

fn default_memory_kib() -> u32 {
    argon2::Params::DEFAULT_M_COST
}

fn default_iterations() -> u32 {
    argon2::Params::DEFAULT_T_COST
}

fn default_parallelism() -> u32 {
    argon2::Params::DEFAULT_P_COST
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

impl PasswordConfig {
    /// Converts to argon2 parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if argon2 rejects the combination.
    pub fn to_params(&self) -> Result<argon2::Params, ConfigError> {
        argon2::Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| ConfigError::invalid("password", e.to_string()))
    }
}

/// Authentication core configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Issuer stamped on issued claims and required on verified tokens.
    #[serde(default = "default_issuer")]
    pub(crate) issuer: String,

    /// Lifetime of credential-issued claims.
    #[serde(with = "humantime_serde", default = "default_token_ttl")]
    pub(crate) token_ttl: Duration,

    /// Expiry tolerance for bearer tokens.
    #[serde(with = "humantime_serde", default = "default_clock_skew")]
    pub(crate) clock_skew: Duration,

    /// Upper bound on a credential lookup or ownership resolution.
    #[serde(with = "humantime_serde", default = "default_backend_timeout")]
    pub(crate) backend_timeout: Duration,

    /// How long a rotated-out key keeps verifying tokens.
    #[serde(with = "humantime_serde", default = "default_rotation_grace")]
    pub(crate) rotation_grace: Duration,

    /// Password hashing cost.
    #[serde(default)]
    pub(crate) password: PasswordConfig,
}

fn default_issuer() -> String {
    DEFAULT_ISSUER.to_owned()
}

fn default_token_ttl() -> Duration {
    DEFAULT_TOKEN_TTL
}

fn default_clock_skew() -> Duration {
    DEFAULT_CLOCK_SKEW
}

fn default_backend_timeout() -> Duration {
    DEFAULT_BACKEND_TIMEOUT
}

fn default_rotation_grace() -> Duration {
    DEFAULT_ROTATION_GRACE
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            token_ttl: DEFAULT_TOKEN_TTL,
            clock_skew: DEFAULT_CLOCK_SKEW,
            backend_timeout: DEFAULT_BACKEND_TIMEOUT,
            rotation_grace: DEFAULT_ROTATION_GRACE,
            password: PasswordConfig::default(),
        }
    }
}

#[bon::bon]
impl AuthConfig {
    /// Creates a new configuration, validating every field.
    ///
    /// # Optional Fields
    ///
    /// * `issuer` - Issuer string (default: `"warden"`).
    /// * `token_ttl` - Lifetime of issued claims (default: 1 hour).
    /// * `clock_skew` - Expiry tolerance (default: zero).
    /// * `backend_timeout` - Bound on backend calls (default: 5 seconds).
    /// * `rotation_grace` - Verification window for rotated keys (default: 1 hour).
    /// * `password` - Argon2id cost (default: argon2 crate defaults).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any field fails [`validate`](Self::validate).
    #[builder]
    pub fn new(
        #[builder(into, default = DEFAULT_ISSUER.to_owned())] issuer: String,
        #[builder(default = DEFAULT_TOKEN_TTL)] token_ttl: Duration,
        #[builder(default = DEFAULT_CLOCK_SKEW)] clock_skew: Duration,
        #[builder(default = DEFAULT_BACKEND_TIMEOUT)] backend_timeout: Duration,
        #[builder(default = DEFAULT_ROTATION_GRACE)] rotation_grace: Duration,
        #[builder(default)] password: PasswordConfig,
    ) -> Result<Self, ConfigError> {
        let config =
            Self { issuer, token_ttl, clock_skew, backend_timeout, rotation_grace, password };
        config.validate()?;
        Ok(config)
    }

    /// Checks every field. Call after deserializing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::invalid("issuer", "cannot be empty"));
        }
        if self.token_ttl.is_zero() {
            return Err(ConfigError::invalid("token_ttl", "must be greater than zero"));
        }
        if self.clock_skew >= self.token_ttl {
            return Err(ConfigError::invalid("clock_skew", "must be shorter than token_ttl"));
        }
        if self.backend_timeout.is_zero() {
            return Err(ConfigError::invalid("backend_timeout", "must be greater than zero"));
        }
        self.password.to_params()?;
        Ok(())
    }

    /// Issuer stamped on issued claims.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Lifetime of credential-issued claims.
    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Expiry tolerance.
    #[must_use]
    pub fn clock_skew(&self) -> Duration {
        self.clock_skew
    }

    /// Bound on backend calls.
    #[must_use]
    pub fn backend_timeout(&self) -> Duration {
        self.backend_timeout
    }

    /// Verification window for rotated keys.
    #[must_use]
    pub fn rotation_grace(&self) -> Duration {
        self.rotation_grace
    }

    /// Password hashing cost.
    #[must_use]
    pub fn password(&self) -> PasswordConfig {
        self.password
    }
}
