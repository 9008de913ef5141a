//! Resource ownership resolution.
//!
//! Each resource kind has one [`OwnershipResolver`] that maps the id from a
//! request path to the owning user, using that kind's store. The static route
//! table names the kind; [`Resolvers::for_kind`] picks the resolver.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use uuid::Uuid;
use warden_storage::{
    HomeRecord, HomeStore, ProductRecord, ProductStore, UserId, UserRecord, UserStore,
};

use crate::error::{AuthError, Result};

/// Kinds of resource a route can carry in its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A user record; owned by itself.
    User,
    /// A product; owned by the user that listed it.
    Product,
    /// A home; owned by the user that registered it.
    Home,
}

impl ResourceKind {
    /// Lower-case name used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Product => "product",
            Self::Home => "home",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record a resolver loaded, handed on to the protected handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// A user record.
    User(UserRecord),
    /// A product record.
    Product(ProductRecord),
    /// A home record.
    Home(HomeRecord),
}

impl Resource {
    /// Kind of the record.
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::User(_) => ResourceKind::User,
            Self::Product(_) => ResourceKind::Product,
            Self::Home(_) => ResourceKind::Home,
        }
    }
}

/// A resource together with its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedResource {
    /// User that owns the resource.
    pub owner_id: UserId,
    /// The loaded record.
    pub resource: Resource,
}

/// Maps a resource id to its owner.
#[async_trait]
pub trait OwnershipResolver: Send + Sync {
    /// Kind this resolver handles.
    fn kind(&self) -> ResourceKind;

    /// Loads the resource and its owner.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ResourceNotFound`] if the record does not exist
    /// and [`AuthError::Backend`] if the store fails.
    async fn resolve(&self, id: Uuid) -> Result<ResolvedResource>;
}

/// Resolves users; a user owns itself.
#[derive(Clone)]
pub struct UserOwnership {
    store: Arc<dyn UserStore>,
}

impl UserOwnership {
    /// Creates a resolver over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OwnershipResolver for UserOwnership {
    fn kind(&self) -> ResourceKind {
        ResourceKind::User
    }

    #[tracing::instrument(skip(self), fields(kind = "user"))]
    async fn resolve(&self, id: Uuid) -> Result<ResolvedResource> {
        let user = self
            .store
            .query_by_id(UserId::from(id))
            .await?
            .ok_or_else(|| AuthError::resource_not_found("user", id))?;
        Ok(ResolvedResource { owner_id: user.id, resource: Resource::User(user) })
    }
}

/// Resolves products to the user that listed them.
#[derive(Clone)]
pub struct ProductOwnership {
    store: Arc<dyn ProductStore>,
}

impl ProductOwnership {
    /// Creates a resolver over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ProductStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OwnershipResolver for ProductOwnership {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Product
    }

    #[tracing::instrument(skip(self), fields(kind = "product"))]
    async fn resolve(&self, id: Uuid) -> Result<ResolvedResource> {
        let product = self
            .store
            .query_by_id(id.into())
            .await?
            .ok_or_else(|| AuthError::resource_not_found("product", id))?;
        Ok(ResolvedResource { owner_id: product.user_id, resource: Resource::Product(product) })
    }
}

/// Resolves homes to the user that registered them.
#[derive(Clone)]
pub struct HomeOwnership {
    store: Arc<dyn HomeStore>,
}

impl HomeOwnership {
    /// Creates a resolver over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn HomeStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OwnershipResolver for HomeOwnership {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Home
    }

    #[tracing::instrument(skip(self), fields(kind = "home"))]
    async fn resolve(&self, id: Uuid) -> Result<ResolvedResource> {
        let home = self
            .store
            .query_by_id(id.into())
            .await?
            .ok_or_else(|| AuthError::resource_not_found("home", id))?;
        Ok(ResolvedResource { owner_id: home.user_id, resource: Resource::Home(home) })
    }
}

/// One resolver per resource kind.
#[derive(Clone)]
pub struct Resolvers {
    users: Arc<dyn OwnershipResolver>,
    products: Arc<dyn OwnershipResolver>,
    homes: Arc<dyn OwnershipResolver>,
}

impl fmt::Debug for Resolvers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolvers").finish_non_exhaustive()
    }
}

impl Resolvers {
    /// Builds the standard resolvers over the given stores.
    #[must_use]
    pub fn new(
        users: Arc<dyn UserStore>,
        products: Arc<dyn ProductStore>,
        homes: Arc<dyn HomeStore>,
    ) -> Self {
        Self {
            users: Arc::new(UserOwnership::new(users)),
            products: Arc::new(ProductOwnership::new(products)),
            homes: Arc::new(HomeOwnership::new(homes)),
        }
    }

    /// Builds from arbitrary resolver implementations.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Backend`] if a resolver reports a kind other than
    /// the slot it is given.
    pub fn from_parts(
        users: Arc<dyn OwnershipResolver>,
        products: Arc<dyn OwnershipResolver>,
        homes: Arc<dyn OwnershipResolver>,
    ) -> Result<Self> {
        for (expected, resolver) in [
            (ResourceKind::User, &users),
            (ResourceKind::Product, &products),
            (ResourceKind::Home, &homes),
        ] {
            if resolver.kind() != expected {
                return Err(AuthError::Backend(warden_storage::StorageError::internal(format!(
                    "resolver for {} reports kind {}",
                    expected,
                    resolver.kind()
                ))));
            }
        }
        Ok(Self { users, products, homes })
    }

    /// Resolver for `kind`.
    #[must_use]
    pub fn for_kind(&self, kind: ResourceKind) -> &dyn OwnershipResolver {
        match kind {
            ResourceKind::User => self.users.as_ref(),
            ResourceKind::Product => self.products.as_ref(),
            ResourceKind::Home => self.homes.as_ref(),
        }
    }
}
