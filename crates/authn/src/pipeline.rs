//! Authentication and authorization pipeline.
//!
//! A request moves through
//!
//! ```text
//! Unauthenticated ──authenticate──▶ Authenticated ──authorize──▶ Authorized ──▶ Forwarded
//!        │                                │
//!        └────────────── Rejection ◀──────┘
//! ```
//!
//! [`AuthPipeline::check`] runs both stages and returns either a
//! [`RequestContext`] carrying the claims and the resolved resource, or a
//! [`Rejection`] naming the stage that failed. [`AuthPipeline::run`] does the
//! same and then hands the context to the protected handler.
//!
//! Every stage that may block (password hashing, resource lookup) is bounded
//! by the configured backend timeout and aborts when the caller's
//! [`CancellationToken`] fires.

use std::{fmt, future::Future, time::Duration};

use base64::{Engine, engine::general_purpose::STANDARD};
use fail::fail_point;
use http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use warden_storage::{HomeRecord, ProductRecord, UserId, UserRecord};
use zeroize::Zeroizing;

use crate::{
    claims::Claims,
    config::AuthConfig,
    credentials::CredentialVerifier,
    error::{AuthError, ErrorClass, Result},
    ownership::{ResolvedResource, Resolvers, Resource},
    routes::Route,
    rules::decide,
    token::TokenVerifier,
};

/// Credentials presented in an `Authorization` header.
pub enum Credentials {
    /// `Bearer <token>`.
    Bearer(Zeroizing<String>),
    /// `Basic <base64(email:password)>`, decoded.
    Basic {
        /// Login email, not yet validated.
        email: String,
        /// Plaintext password.
        password: Zeroizing<String>,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer([REDACTED])"),
            Self::Basic { email, .. } => {
                f.debug_struct("Basic").field("email", email).finish_non_exhaustive()
            },
        }
    }
}

/// Parses the `Authorization` header.
///
/// The value must be exactly two whitespace-separated parts, the first being
/// `Bearer` or `Basic` (case-sensitive).
///
/// # Errors
///
/// - [`AuthError::MissingCredentials`] when the header is absent
/// - [`AuthError::Malformed`] for a non-ASCII value, wrong part count or unknown scheme
/// - [`AuthError::InvalidCredentialFormat`] when a Basic payload is not
///   base64 of a UTF-8 `email:password`
pub fn parse_authorization(headers: &HeaderMap) -> Result<Credentials> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthError::MissingCredentials)?;
    let value = value
        .to_str()
        .map_err(|_| AuthError::malformed("authorization header is not visible ASCII"))?;

    let parts: Vec<&str> = value.split_whitespace().collect();
    let [scheme, credential] = parts.as_slice() else {
        return Err(AuthError::malformed("expected authorization format: <scheme> <credential>"));
    };

    match *scheme {
        "Bearer" => Ok(Credentials::Bearer(Zeroizing::new((*credential).to_owned()))),
        "Basic" => parse_basic(credential),
        other => Err(AuthError::malformed(format!("unsupported authorization scheme: {other}"))),
    }
}

fn parse_basic(encoded: &str) -> Result<Credentials> {
    let decoded = Zeroizing::new(
        STANDARD
            .decode(encoded)
            .map_err(|_| AuthError::InvalidCredentialFormat("basic credential is not base64".into()))?,
    );
    let text = std::str::from_utf8(&decoded)
        .map_err(|_| AuthError::InvalidCredentialFormat("basic credential is not UTF-8".into()))?;
    let (email, password) = text.split_once(':').ok_or_else(|| {
        AuthError::InvalidCredentialFormat("basic credential has no ':' separator".into())
    })?;
    Ok(Credentials::Basic { email: email.to_owned(), password: Zeroizing::new(password.to_owned()) })
}

/// Pipeline stage a request has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Nothing verified yet.
    Unauthenticated,
    /// Claims established.
    Authenticated,
    /// Rule satisfied for the route.
    Authorized,
    /// Handed to the protected handler.
    Forwarded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticated => "authenticated",
            Self::Authorized => "authorized",
            Self::Forwarded => "forwarded",
        };
        f.write_str(name)
    }
}

/// A request stopped by the pipeline.
///
/// `stage` is the last stage the request reached; the error says why it got
/// no further.
#[derive(Debug, Error)]
#[error("rejected after {stage}: {error}")]
pub struct Rejection {
    /// Stage the request was in when it failed.
    pub stage: Stage,
    /// Cause, with internal detail for logs.
    #[source]
    pub error: AuthError,
}

impl Rejection {
    fn new(stage: Stage, error: AuthError) -> Self {
        Self { stage, error }
    }

    /// HTTP status to respond with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.error.status()
    }

    /// Body safe to return to the caller.
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        self.error.public_message()
    }
}

/// Request-scoped result of a successful check.
#[derive(Debug, Clone)]
pub struct RequestContext {
    route: Route,
    claims: Claims,
    resource: Option<ResolvedResource>,
}

impl RequestContext {
    /// Route the request was checked against.
    #[must_use]
    pub fn route(&self) -> Route {
        self.route
    }

    /// Authenticated claims.
    #[must_use]
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// Authenticated caller.
    #[must_use]
    pub fn subject(&self) -> UserId {
        self.claims.subject()
    }

    /// Resource named by the path, with its owner.
    #[must_use]
    pub fn resource(&self) -> Option<&ResolvedResource> {
        self.resource.as_ref()
    }

    /// User named by the path, on user routes.
    #[must_use]
    pub fn user(&self) -> Option<&UserRecord> {
        match self.resource.as_ref().map(|r| &r.resource) {
            Some(Resource::User(user)) => Some(user),
            _ => None,
        }
    }

    /// Product named by the path, on product routes.
    #[must_use]
    pub fn product(&self) -> Option<&ProductRecord> {
        match self.resource.as_ref().map(|r| &r.resource) {
            Some(Resource::Product(product)) => Some(product),
            _ => None,
        }
    }

    /// Home named by the path, on home routes.
    #[must_use]
    pub fn home(&self) -> Option<&HomeRecord> {
        match self.resource.as_ref().map(|r| &r.resource) {
            Some(Resource::Home(home)) => Some(home),
            _ => None,
        }
    }
}

/// Runs authentication and authorization ahead of a protected handler.
#[derive(Debug)]
pub struct AuthPipeline {
    tokens: TokenVerifier,
    credentials: CredentialVerifier,
    resolvers: Resolvers,
    backend_timeout: Duration,
}

impl AuthPipeline {
    /// Assembles a pipeline; blocking stages are bounded by
    /// `config.backend_timeout()`.
    #[must_use]
    pub fn new(
        tokens: TokenVerifier,
        credentials: CredentialVerifier,
        resolvers: Resolvers,
        config: &AuthConfig,
    ) -> Self {
        Self { tokens, credentials, resolvers, backend_timeout: config.backend_timeout() }
    }

    /// Establishes the caller's claims from the `Authorization` header.
    ///
    /// # Errors
    ///
    /// Any authentication error from header parsing or the verifiers,
    /// [`AuthError::Cancelled`] if `cancel` fires, and a `Backend` timeout if
    /// the credential lookup exceeds the backend timeout.
    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
        cancel: &CancellationToken,
    ) -> Result<Claims> {
        if cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }
        match parse_authorization(headers)? {
            Credentials::Bearer(token) => self.tokens.verify(&token),
            Credentials::Basic { email, password } => {
                self.bounded(cancel, self.credentials.verify(&email, &password)).await
            },
        }
    }

    /// Checks `claims` against the policy of `route`.
    ///
    /// `resource_id` is the raw path parameter for routes that carry one and is
    /// ignored otherwise. Returns the resolved resource, if any.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidId`] if the route needs an id and `resource_id` is
    ///   absent or not a UUID; the resolver is not called
    /// - [`AuthError::ResourceNotFound`] if the resource does not exist
    /// - [`AuthError::InsufficientPrivilege`] if the rule denies
    /// - [`AuthError::Backend`] if the resolver fails or times out
    /// - [`AuthError::Cancelled`] if `cancel` fires
    pub async fn authorize(
        &self,
        claims: &Claims,
        route: Route,
        resource_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Option<ResolvedResource>> {
        let policy = route.policy();

        let resolved = match policy.resource {
            None => None,
            Some(kind) => {
                let raw = resource_id
                    .ok_or_else(|| AuthError::InvalidId(format!("missing {kind} id")))?;
                let id = Uuid::parse_str(raw).map_err(|_| AuthError::InvalidId(raw.to_owned()))?;

                fail_point!("pipeline-before-resolve", |_| {
                    Err(AuthError::Backend(warden_storage::StorageError::connection("injected resolver failure")))
                });
                Some(self.bounded(cancel, self.resolvers.for_kind(kind).resolve(id)).await?)
            },
        };

        let owner = resolved.as_ref().map_or_else(UserId::nil, |r| r.owner_id);
        let decision = decide(claims, policy.rule, owner);
        if !decision.allowed {
            tracing::warn!(%route, subject = %claims.subject(), reason = %decision.reason, "authorization denied");
        }
        decision.into_result()?;
        Ok(resolved)
    }

    /// Runs both stages for one request.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] carrying the stage and the cause.
    #[tracing::instrument(skip(self, headers, route, cancel), fields(route = %route))]
    pub async fn check(
        &self,
        headers: &HeaderMap,
        route: Route,
        resource_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> std::result::Result<RequestContext, Rejection> {
        let claims = self
            .authenticate(headers, cancel)
            .await
            .map_err(|e| reject(Stage::Unauthenticated, e))?;
        tracing::debug!(stage = %Stage::Authenticated, subject = %claims.subject());

        let resource = self
            .authorize(&claims, route, resource_id, cancel)
            .await
            .map_err(|e| reject(Stage::Authenticated, e))?;
        tracing::debug!(stage = %Stage::Authorized, subject = %claims.subject());

        Ok(RequestContext { route, claims, resource })
    }

    /// Checks the request and, if it passes, forwards the context to `next`.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] without calling `next` if either stage fails.
    pub async fn run<F, Fut, T>(
        &self,
        headers: &HeaderMap,
        route: Route,
        resource_id: Option<&str>,
        cancel: &CancellationToken,
        next: F,
    ) -> std::result::Result<T, Rejection>
    where
        F: FnOnce(RequestContext) -> Fut,
        Fut: Future<Output = T>,
    {
        let ctx = self.check(headers, route, resource_id, cancel).await?;
        tracing::debug!(stage = %Stage::Forwarded, %route);
        Ok(next(ctx).await)
    }

    async fn bounded<T>(
        &self,
        cancel: &CancellationToken,
        work: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(AuthError::Cancelled),
            outcome = tokio::time::timeout(self.backend_timeout, work) => {
                outcome.unwrap_or_else(|_| Err(AuthError::timeout()))
            },
        }
    }
}

fn reject(stage: Stage, error: AuthError) -> Rejection {
    match error.class() {
        ErrorClass::Internal => tracing::error!(%stage, error = %error, "request rejected"),
        _ => tracing::info!(%stage, error = %error, "request rejected"),
    }
    Rejection::new(stage, error)
}
