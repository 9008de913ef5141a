//! Shared fixture for integration tests: a key store with one signing key,
//! in-memory stores and a pipeline wired over them.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::Utc;
use http::{HeaderMap, HeaderValue, header::AUTHORIZATION};
use warden_authn::{
    AuthConfig, AuthPipeline, Claims, CredentialVerifier, KeyStore, Resolvers, TokenIssuer,
    TokenVerifier, parse_roles,
    testutil::{fast_password_config, test_key_record_with_private, test_user},
};
use warden_storage::{
    HomeRecord, MemoryHomeStore, MemoryProductStore, MemoryUserStore, ProductRecord, UserId,
    UserRecord,
};
use zeroize::Zeroizing;

pub const SIGNING_KID: &str = "k1";

pub struct Harness {
    pub config: AuthConfig,
    pub der: Zeroizing<Vec<u8>>,
    pub keys: Arc<KeyStore>,
    pub issuer: TokenIssuer,
    pub users: MemoryUserStore,
    pub products: MemoryProductStore,
    pub homes: MemoryHomeStore,
    pub pipeline: AuthPipeline,
}

pub fn test_config() -> AuthConfig {
    AuthConfig::builder().password(fast_password_config()).build().expect("valid config")
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AuthConfig) -> Self {
        let users = MemoryUserStore::new();
        let products = MemoryProductStore::new();
        let homes = MemoryHomeStore::new();
        let resolvers = Resolvers::new(
            Arc::new(users.clone()),
            Arc::new(products.clone()),
            Arc::new(homes.clone()),
        );
        Self::with_resolvers(config, users, products, homes, resolvers)
    }

    pub fn with_resolvers(
        config: AuthConfig,
        users: MemoryUserStore,
        products: MemoryProductStore,
        homes: MemoryHomeStore,
        resolvers: Resolvers,
    ) -> Self {
        let (der, record) = test_key_record_with_private(SIGNING_KID);
        let keys = Arc::new(
            KeyStore::from_records(vec![record], config.rotation_grace()).expect("key store"),
        );
        let pipeline = AuthPipeline::new(
            TokenVerifier::new(Arc::clone(&keys), &config),
            CredentialVerifier::new(Arc::new(users.clone()), &config).expect("credential verifier"),
            resolvers,
            &config,
        );
        Self {
            issuer: TokenIssuer::new(Arc::clone(&keys)),
            config,
            der,
            keys,
            users,
            products,
            homes,
            pipeline,
        }
    }

    pub fn add_user(&self, email: &str, password: &str, roles: &[&str]) -> UserRecord {
        let user = test_user(email, password, roles);
        self.users.insert(user.clone()).expect("insert user");
        user
    }

    pub fn add_product(&self, owner: UserId) -> ProductRecord {
        let product = ProductRecord::builder().user_id(owner).name("Comic Books").cost(50).quantity(42).build();
        self.products.insert(product.clone());
        product
    }

    pub fn add_home(&self, owner: UserId) -> HomeRecord {
        let home = HomeRecord::builder().user_id(owner).kind("SINGLE FAMILY").build();
        self.homes.insert(home.clone());
        home
    }

    pub fn claims_for(&self, user: &UserRecord) -> Claims {
        Claims::issue(
            user.id,
            parse_roles(&user.roles).expect("known roles"),
            self.config.issuer(),
            Utc::now(),
            self.config.token_ttl(),
        )
        .expect("claims")
    }

    pub fn token_for(&self, user: &UserRecord) -> String {
        self.issuer.issue(&self.claims_for(user)).expect("issue token")
    }

    pub fn bearer_for(&self, user: &UserRecord) -> HeaderMap {
        bearer(&self.token_for(user))
    }
}

pub fn bearer(token: &str) -> HeaderMap {
    authorization(&format!("Bearer {token}"))
}

pub fn basic(email: &str, password: &str) -> HeaderMap {
    authorization(&format!("Basic {}", STANDARD.encode(format!("{email}:{password}"))))
}

pub fn authorization(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(value).expect("header value"));
    headers
}
