//! Authorization rules and the rule engine.

use std::fmt;

use serde::{Deserialize, Serialize};
use warden_storage::UserId;

use crate::{
    claims::{Claims, Role},
    error::{AuthError, Result},
};

/// Access policy required by a protected operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rule {
    /// Caller must hold `ADMIN`.
    AdminOnly,
    /// Caller must hold `USER`.
    UserOnly,
    /// Caller must hold at least one role.
    Any,
    /// Caller must hold `ADMIN` or be the owner of the resource.
    AdminOrSubject,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AdminOnly => "AdminOnly",
            Self::UserOnly => "UserOnly",
            Self::Any => "Any",
            Self::AdminOrSubject => "AdminOrSubject",
        };
        f.write_str(name)
    }
}

/// Outcome of [`decide`].
///
/// `reason` is for server-side logs only; callers are told "not authorized".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Why, in terms of roles held and rule required.
    pub reason: String,
}

impl Decision {
    /// Converts a denial into [`AuthError::InsufficientPrivilege`].
    ///
    /// # Errors
    ///
    /// Returns the denial when `allowed` is false.
    pub fn into_result(self) -> Result<()> {
        if self.allowed {
            Ok(())
        } else {
            Err(AuthError::insufficient_privilege(self.reason))
        }
    }
}

/// Decides whether `claims` satisfy `rule` for a resource owned by `owner`.
///
/// Pass [`UserId::nil`] as `owner` when the route carries no resource id; a
/// nil owner never equals a real subject, so `AdminOrSubject` then admits
/// admins only.
#[must_use]
pub fn decide(claims: &Claims, rule: Rule, owner: UserId) -> Decision {
    let is_admin = claims.has_role(Role::Admin);
    let (allowed, why) = match rule {
        Rule::AdminOnly => (is_admin, "requires ADMIN"),
        Rule::UserOnly => (claims.has_role(Role::User), "requires USER"),
        Rule::Any => (!claims.roles().is_empty(), "requires any role"),
        Rule::AdminOrSubject => {
            let is_subject = !owner.is_nil() && claims.subject() == owner;
            (is_admin || is_subject, "requires ADMIN or ownership")
        },
    };

    let roles: Vec<&str> = claims.roles().iter().map(|r| r.as_str()).collect();
    let reason = if allowed {
        format!("rule {rule} satisfied by roles [{}]", roles.join(","))
    } else {
        format!(
            "rule {rule} {why}: subject {} with roles [{}], owner {owner}",
            claims.subject(),
            roles.join(",")
        )
    };
    Decision { allowed, reason }
}
