//! Static route table of the sales API.
//!
//! Every protected operation is a [`Route`] variant, and [`Route::policy`] is
//! an exhaustive `match`: adding a route without deciding its rule and
//! resource kind does not compile.

use std::fmt;

use http::Method;

use crate::{ownership::ResourceKind, rules::Rule};

/// What a route requires before its handler may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoutePolicy {
    /// Rule the caller's claims must satisfy.
    pub rule: Rule,
    /// Resource kind named by the route's single path identifier, if any.
    pub resource: Option<ResourceKind>,
}

impl RoutePolicy {
    const fn new(rule: Rule, resource: Option<ResourceKind>) -> Self {
        Self { rule, resource }
    }
}

/// A protected operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Route {
    HomeCreate,
    HomeUpdate,
    HomeDelete,
    HomeQuery,
    HomeQueryById,
    ProductCreate,
    ProductUpdate,
    ProductDelete,
    ProductQuery,
    ProductQueryById,
    TranCreate,
    UserToken,
    UserCreate,
    UserUpdate,
    UserUpdateRole,
    UserDelete,
    UserQuery,
    UserQueryById,
    VProductQuery,
}

impl Route {
    /// Every route, in table order.
    pub const ALL: [Self; 19] = [
        Self::HomeCreate,
        Self::HomeUpdate,
        Self::HomeDelete,
        Self::HomeQuery,
        Self::HomeQueryById,
        Self::ProductCreate,
        Self::ProductUpdate,
        Self::ProductDelete,
        Self::ProductQuery,
        Self::ProductQueryById,
        Self::TranCreate,
        Self::UserToken,
        Self::UserCreate,
        Self::UserUpdate,
        Self::UserUpdateRole,
        Self::UserDelete,
        Self::UserQuery,
        Self::UserQueryById,
        Self::VProductQuery,
    ];

    /// Rule and resource kind this route is protected by.
    ///
    /// Role update resolves the target user (so a missing user is rejected
    /// like any other ownership route) but requires `ADMIN` regardless of
    /// ownership: users may not grant themselves roles.
    #[must_use]
    pub const fn policy(self) -> RoutePolicy {
        use ResourceKind::{Home, Product, User};
        match self {
            Self::HomeCreate | Self::ProductCreate | Self::TranCreate => {
                RoutePolicy::new(Rule::UserOnly, None)
            },
            Self::HomeUpdate | Self::HomeDelete | Self::HomeQueryById => {
                RoutePolicy::new(Rule::AdminOrSubject, Some(Home))
            },
            Self::ProductUpdate | Self::ProductDelete | Self::ProductQueryById => {
                RoutePolicy::new(Rule::AdminOrSubject, Some(Product))
            },
            Self::UserUpdate | Self::UserDelete | Self::UserQueryById => {
                RoutePolicy::new(Rule::AdminOrSubject, Some(User))
            },
            Self::UserUpdateRole => RoutePolicy::new(Rule::AdminOnly, Some(User)),
            Self::HomeQuery | Self::ProductQuery | Self::UserToken => {
                RoutePolicy::new(Rule::Any, None)
            },
            Self::UserCreate | Self::UserQuery | Self::VProductQuery => {
                RoutePolicy::new(Rule::AdminOnly, None)
            },
        }
    }

    /// HTTP method.
    #[must_use]
    pub fn method(self) -> Method {
        match self {
            Self::HomeCreate | Self::ProductCreate | Self::TranCreate | Self::UserCreate => {
                Method::POST
            },
            Self::HomeUpdate | Self::ProductUpdate | Self::UserUpdate | Self::UserUpdateRole => {
                Method::PUT
            },
            Self::HomeDelete | Self::ProductDelete | Self::UserDelete => Method::DELETE,
            Self::HomeQuery
            | Self::HomeQueryById
            | Self::ProductQuery
            | Self::ProductQueryById
            | Self::UserToken
            | Self::UserQuery
            | Self::UserQueryById
            | Self::VProductQuery => Method::GET,
        }
    }

    /// Path template; `:name` marks a path parameter.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::HomeCreate | Self::HomeQuery => "/v1/homes",
            Self::HomeUpdate | Self::HomeDelete | Self::HomeQueryById => "/v1/homes/:home_id",
            Self::ProductCreate | Self::ProductQuery => "/v1/products",
            Self::ProductUpdate | Self::ProductDelete | Self::ProductQueryById => {
                "/v1/products/:product_id"
            },
            Self::TranCreate => "/v1/tran",
            Self::UserToken => "/v1/token/:kid",
            Self::UserCreate | Self::UserQuery => "/v1/users",
            Self::UserUpdate | Self::UserDelete | Self::UserQueryById => "/v1/users/:user_id",
            Self::UserUpdateRole => "/v1/role/:user_id",
            Self::VProductQuery => "/v1/vproducts",
        }
    }

    /// Name of the path parameter carrying the resource id, if the route has one.
    #[must_use]
    pub const fn resource_param(self) -> Option<&'static str> {
        match self.policy().resource {
            Some(ResourceKind::User) => Some("user_id"),
            Some(ResourceKind::Product) => Some("product_id"),
            Some(ResourceKind::Home) => Some("home_id"),
            None => None,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.path())
    }
}
