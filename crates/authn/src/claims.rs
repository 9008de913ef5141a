//! Caller identity: roles and claims.
//!
//! [`Claims`] is the validated, typed identity handed to the rule engine.
//! [`TokenClaims`] is its wire shape inside a signed token payload. Going from
//! wire to typed form enforces the invariants (`exp > iat`, UUID subject,
//! non-empty known roles); going the other way cannot fail.

use std::{collections::BTreeSet, fmt, str::FromStr};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use warden_storage::UserId;

use crate::error::{AuthError, Result};

/// A role a caller can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Full access.
    Admin,
    /// Ordinary account holder.
    User,
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::User => "USER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Self::Admin),
            "USER" => Ok(Self::User),
            other => Err(UnknownRole(other.to_owned())),
        }
    }
}

/// A set of roles. Ordered so that logs and encoded tokens are stable.
pub type RoleSet = BTreeSet<Role>;

/// Parses role names into a set, rejecting unknown names.
///
/// # Errors
///
/// Returns [`UnknownRole`] naming the first unrecognised entry.
pub fn parse_roles<I, S>(names: I) -> std::result::Result<RoleSet, UnknownRole>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names.into_iter().map(|n| n.as_ref().parse::<Role>()).collect()
}

/// Validated identity of an authenticated caller.
///
/// Timestamps are whole seconds, matching their encoding in a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    subject: UserId,
    roles: RoleSet,
    issuer: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Claims {
    /// Builds claims, enforcing their invariants.
    ///
    /// Sub-second precision is dropped from both timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidClaims`] if `roles` is empty or
    /// `expires_at <= issued_at`, and [`AuthError::InvalidSubject`] for the
    /// nil subject.
    pub fn new(
        subject: UserId,
        roles: RoleSet,
        issuer: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Self> {
        if subject.is_nil() {
            return Err(AuthError::InvalidSubject("nil subject".into()));
        }
        if roles.is_empty() {
            return Err(AuthError::invalid_claims("no roles"));
        }
        let issued_at = truncate(issued_at)?;
        let expires_at = truncate(expires_at)?;
        if expires_at <= issued_at {
            return Err(AuthError::invalid_claims("expiry is not after issue time"));
        }
        Ok(Self { subject, roles, issuer: issuer.into(), issued_at, expires_at })
    }

    /// Builds claims issued at `now` and valid for `ttl`.
    ///
    /// # Errors
    ///
    /// As [`Claims::new`]; also fails if `ttl` does not fit a timestamp.
    pub fn issue(
        subject: UserId,
        roles: RoleSet,
        issuer: impl Into<String>,
        now: DateTime<Utc>,
        ttl: std::time::Duration,
    ) -> Result<Self> {
        let ttl = Duration::from_std(ttl)
            .map_err(|_| AuthError::invalid_claims("ttl out of range"))?;
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::invalid_claims("expiry out of range"))?;
        Self::new(subject, roles, issuer, now, expires_at)
    }

    /// Subject (the caller's user id).
    #[must_use]
    pub fn subject(&self) -> UserId {
        self.subject
    }

    /// Roles held.
    #[must_use]
    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    /// Returns `true` if the caller holds `role`.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Issuer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issue time.
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Expiry time.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns `true` once `now` reaches `expires_at + skew`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>, skew: std::time::Duration) -> bool {
        let skew = Duration::from_std(skew).unwrap_or(Duration::zero());
        match self.expires_at.checked_add_signed(skew) {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }

    /// Wire form for signing.
    #[must_use]
    pub fn to_token_claims(&self) -> TokenClaims {
        TokenClaims {
            sub: Some(self.subject.to_string()),
            iss: self.issuer.clone(),
            iat: self.issued_at.timestamp(),
            exp: self.expires_at.timestamp(),
            roles: self.roles.iter().map(|r| r.as_str().to_owned()).collect(),
        }
    }
}

impl TryFrom<TokenClaims> for Claims {
    type Error = AuthError;

    fn try_from(wire: TokenClaims) -> Result<Self> {
        let sub = match wire.sub.as_deref().map(str::trim) {
            None | Some("") => return Err(AuthError::NoSubject),
            Some(sub) => sub,
        };
        let subject: UserId =
            sub.parse().map_err(|_| AuthError::InvalidSubject(sub.to_owned()))?;
        let roles =
            parse_roles(&wire.roles).map_err(|e| AuthError::invalid_claims(e.to_string()))?;
        Self::new(subject, roles, wire.iss, from_timestamp(wire.iat)?, from_timestamp(wire.exp)?)
    }
}

/// Payload of a signed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject, a UUID string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Issuer.
    #[serde(default)]
    pub iss: String,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
    /// Role names.
    #[serde(default)]
    pub roles: Vec<String>,
}

fn from_timestamp(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| AuthError::invalid_claims(format!("timestamp out of range: {secs}")))
}

fn truncate(ts: DateTime<Utc>) -> Result<DateTime<Utc>> {
    from_timestamp(ts.timestamp())
}
