//! # Warden Authentication
//!
//! Identity verification and authorization rules for the user, product and
//! home endpoints of the sales API.
//!
//! This crate provides:
//! - **Key store**: Ed25519 key material indexed by `kid`, with copy-on-write rotation
//! - **Token verification and issuance**: EdDSA-signed bearer tokens
//! - **Credential verification**: email/password against Argon2id hashes
//! - **Rule engine**: `AdminOnly`, `UserOnly`, `Any`, `AdminOrSubject`
//! - **Ownership resolvers**: resource id to owning user, one per resource kind
//! - **Pipeline**: the ordered check run before a protected handler
//!
//! ## Security
//!
//! - Only EdDSA is accepted; `none` and symmetric algorithms are rejected before key lookup
//! - Unknown user, wrong password and disabled account fail identically
//! - Callers see one of four fixed messages; rule and role detail stays in logs
//! - A missing resource is reported as "not authorized", never "not found"
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use http::HeaderMap;
//! use tokio_util::sync::CancellationToken;
//! use warden_authn::{
//!     AuthConfig, AuthPipeline, CredentialVerifier, KeyStore, Resolvers, Route, TokenVerifier,
//! };
//! use warden_storage::{FileKeySource, MemoryHomeStore, MemoryProductStore, MemoryUserStore};
//!
//! # async fn example(headers: HeaderMap) -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig::default();
//! let source = FileKeySource::new("/etc/warden/keys.json");
//! let keys = Arc::new(KeyStore::load(&source, config.rotation_grace()).await?);
//!
//! let users = Arc::new(MemoryUserStore::new());
//! let pipeline = AuthPipeline::new(
//!     TokenVerifier::new(Arc::clone(&keys), &config),
//!     CredentialVerifier::new(users.clone(), &config)?,
//!     Resolvers::new(users, Arc::new(MemoryProductStore::new()), Arc::new(MemoryHomeStore::new())),
//!     &config,
//! );
//!
//! let product_id = "45b5fbd3-755f-4379-8f07-a58d4a30fa2f";
//! match pipeline.check(&headers, Route::ProductQueryById, Some(product_id), &CancellationToken::new()).await {
//!     Ok(ctx) => println!("{} may read {:?}", ctx.subject(), ctx.product()),
//!     Err(rejection) => println!("{} {}", rejection.status(), rejection.public_message()),
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Roles and claims.
pub mod claims;
/// Configuration.
pub mod config;
/// Email/password verification and password hashing.
pub mod credentials;
/// Authentication error types.
pub mod error;
/// Signing key store.
pub mod keys;
/// Resource ownership resolvers.
pub mod ownership;
/// Authentication and authorization pipeline.
pub mod pipeline;
/// Static route table.
pub mod routes;
/// Authorization rule engine.
pub mod rules;
/// Test helpers.
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;
/// Bearer token verification and issuance.
pub mod token;
/// Algorithm and key ID validation.
pub mod validation;

pub use claims::{Claims, Role, RoleSet, TokenClaims, UnknownRole, parse_roles};
pub use config::{AuthConfig, PasswordConfig};
pub use credentials::{CredentialVerifier, PasswordHasher, parse_email};
pub use error::{AuthError, ConfigError, ErrorClass, Result};
pub use keys::{IssuingKey, KeyStore};
pub use ownership::{
    HomeOwnership, OwnershipResolver, ProductOwnership, ResolvedResource, Resolvers, Resource,
    ResourceKind, UserOwnership,
};
pub use pipeline::{
    AuthPipeline, Credentials, Rejection, RequestContext, Stage, parse_authorization,
};
pub use routes::{Route, RoutePolicy};
pub use rules::{Decision, Rule, decide};
pub use token::{TokenHeader, TokenIssuer, TokenVerifier, decode_token_header};
pub use validation::{ACCEPTED_ALGORITHM, validate_algorithm, validate_kid};
