//! End-to-end pipeline scenarios: bearer and basic authentication, ownership
//! gating per resource kind, identifier validation, backend failures,
//! timeouts and cancellation.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

mod common;

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use common::{Harness, basic, bearer, test_config};
use http::{HeaderMap, StatusCode};
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use warden_authn::{
    AuthError, AuthConfig, Claims, OwnershipResolver, ResolvedResource, Resolvers, ResourceKind,
    Role, RoleSet, Route, Stage, TokenVerifier, assert_auth_error,
    testutil::{fast_password_config, sign_raw_token},
};
use warden_storage::{
    MemoryHomeStore, MemoryProductStore, MemoryUserStore, ProductId, ProductRecord, ProductStore,
    StorageError, StorageResult, UserId,
};

fn cancel() -> CancellationToken {
    CancellationToken::new()
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bearer_token_authenticates() {
    let h = Harness::new();
    let user = h.add_user("user@example.com", "gophers", &["USER"]);

    let claims = h.pipeline.authenticate(&h.bearer_for(&user), &cancel()).await.unwrap();
    assert_eq!(claims.subject(), user.id);
    assert!(claims.has_role(Role::User));
}

#[tokio::test]
async fn basic_credentials_authenticate() {
    let h = Harness::new();
    let user = h.add_user("admin@example.com", "gophers", &["ADMIN", "USER"]);

    let claims =
        h.pipeline.authenticate(&basic("admin@example.com", "gophers"), &cancel()).await.unwrap();
    assert_eq!(claims.subject(), user.id);
    assert!(claims.has_role(Role::Admin));
    assert_eq!(claims.issuer(), h.config.issuer());
}

#[tokio::test]
async fn wrong_password_is_indistinguishable_from_unknown_user() {
    let h = Harness::new();
    h.add_user("user@example.com", "correctpass", &["USER"]);

    let wrong = h
        .pipeline
        .check(&basic("user@example.com", "wrongpass"), Route::ProductQuery, None, &cancel())
        .await
        .unwrap_err();
    let unknown = h
        .pipeline
        .check(&basic("nobody@example.com", "wrongpass"), Route::ProductQuery, None, &cancel())
        .await
        .unwrap_err();

    assert!(matches!(wrong.error, AuthError::InvalidCredentials));
    assert!(matches!(unknown.error, AuthError::InvalidCredentials));
    assert_eq!(wrong.error.to_string(), unknown.error.to_string());
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status(), unknown.status());
    assert_eq!(wrong.public_message(), unknown.public_message());
    assert_eq!(wrong.stage, Stage::Unauthenticated);
}

#[tokio::test]
async fn disabled_account_is_rejected_like_bad_password() {
    let h = Harness::new();
    let mut user = warden_authn::testutil::test_user("off@example.com", "gophers", &["USER"]);
    user.enabled = false;
    h.users.insert(user).unwrap();

    let result = h.pipeline.authenticate(&basic("off@example.com", "gophers"), &cancel()).await;
    assert_auth_error!(result, InvalidCredentials);
}

#[tokio::test]
async fn malformed_email_in_basic_credential() {
    let h = Harness::new();
    let result = h.pipeline.authenticate(&basic("not-an-email", "pw"), &cancel()).await;
    assert_auth_error!(result, InvalidCredentialFormat);
}

#[tokio::test]
async fn missing_and_malformed_headers_are_unauthenticated() {
    let h = Harness::new();

    let missing =
        h.pipeline.check(&HeaderMap::new(), Route::ProductQuery, None, &cancel()).await.unwrap_err();
    assert!(matches!(missing.error, AuthError::MissingCredentials));
    assert_eq!(missing.public_message(), "unauthenticated");

    let digest = h
        .pipeline
        .check(&common::authorization("Digest abc"), Route::ProductQuery, None, &cancel())
        .await
        .unwrap_err();
    assert!(matches!(digest.error, AuthError::Malformed(_)));
    assert_eq!(digest.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn undecodable_basic_payload_is_unauthenticated() {
    let h = Harness::new();

    for value in ["Basic %%%", "Basic dXNlckBleGFtcGxlLmNvbQ==", "Basic //79"] {
        let rejection = h
            .pipeline
            .check(&common::authorization(value), Route::ProductQuery, None, &cancel())
            .await
            .unwrap_err();
        assert!(matches!(rejection.error, AuthError::InvalidCredentialFormat(_)), "{value}");
        assert_eq!(rejection.stage, Stage::Unauthenticated);
        assert_eq!(rejection.status(), StatusCode::UNAUTHORIZED, "{value}");
        assert_eq!(rejection.public_message(), "unauthenticated");
    }
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let h = Harness::new();
    let user = h.add_user("user@example.com", "gophers", &["USER"]);
    let past = Utc::now() - chrono::Duration::hours(2);
    let claims = Claims::issue(
        user.id,
        RoleSet::from([Role::User]),
        h.config.issuer(),
        past,
        Duration::from_secs(3600),
    )
    .unwrap();
    let token = h.issuer.issue(&claims).unwrap();

    let rejection = h.pipeline.check(&bearer(&token), Route::ProductQuery, None, &cancel()).await.unwrap_err();
    assert!(matches!(rejection.error, AuthError::Expired));
    assert_eq!(rejection.public_message(), "unauthenticated");
}

#[tokio::test]
async fn token_signed_with_unknown_key_is_rejected() {
    let h = Harness::new();
    let user = h.add_user("user@example.com", "gophers", &["USER"]);
    let (other_der, _) = warden_authn::testutil::generate_test_keypair();
    let token = sign_raw_token(&other_der, "k-unknown", &serde_json::json!(h.claims_for(&user).to_token_claims()));

    let result = h.pipeline.authenticate(&bearer(&token), &cancel()).await;
    assert_auth_error!(result, UnknownKey);
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

#[tokio::test]
async fn owner_may_access_own_product_but_not_others() {
    let h = Harness::new();
    let u1 = h.add_user("u1@example.com", "gophers", &["USER"]);
    let u2 = h.add_user("u2@example.com", "gophers", &["USER"]);
    let mine = h.add_product(u1.id);
    let theirs = h.add_product(u2.id);

    let ctx = h
        .pipeline
        .check(&h.bearer_for(&u1), Route::ProductQueryById, Some(&mine.id.to_string()), &cancel())
        .await
        .unwrap();
    assert_eq!(ctx.subject(), u1.id);
    assert_eq!(ctx.product(), Some(&mine));
    assert_eq!(ctx.resource().map(|r| r.owner_id), Some(u1.id));
    assert!(ctx.user().is_none());

    let denied = h
        .pipeline
        .check(&h.bearer_for(&u1), Route::ProductUpdate, Some(&theirs.id.to_string()), &cancel())
        .await
        .unwrap_err();
    assert!(matches!(denied.error, AuthError::InsufficientPrivilege { .. }));
    assert_eq!(denied.stage, Stage::Authenticated);
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(denied.public_message(), "not authorized");
}

#[tokio::test]
async fn admin_may_access_any_home() {
    let h = Harness::new();
    let admin = h.add_user("admin@example.com", "gophers", &["ADMIN"]);
    let owner = h.add_user("owner@example.com", "gophers", &["USER"]);
    let home = h.add_home(owner.id);

    let ctx = h
        .pipeline
        .check(&h.bearer_for(&admin), Route::HomeDelete, Some(&home.id.to_string()), &cancel())
        .await
        .unwrap();
    assert_eq!(ctx.home(), Some(&home));
    assert_eq!(ctx.resource().map(|r| r.owner_id), Some(owner.id));
}

#[tokio::test]
async fn user_resource_is_owned_by_itself() {
    let h = Harness::new();
    let user = h.add_user("user@example.com", "gophers", &["USER"]);
    let other = h.add_user("other@example.com", "gophers", &["USER"]);

    let ctx = h
        .pipeline
        .check(&h.bearer_for(&user), Route::UserQueryById, Some(&user.id.to_string()), &cancel())
        .await
        .unwrap();
    assert_eq!(ctx.user().map(|u| u.id), Some(user.id));

    let denied = h
        .pipeline
        .check(&h.bearer_for(&user), Route::UserDelete, Some(&other.id.to_string()), &cancel())
        .await
        .unwrap_err();
    assert!(matches!(denied.error, AuthError::InsufficientPrivilege { .. }));
}

#[tokio::test]
async fn role_update_requires_admin_even_for_self() {
    let h = Harness::new();
    let user = h.add_user("user@example.com", "gophers", &["USER"]);
    let admin = h.add_user("admin@example.com", "gophers", &["ADMIN"]);
    let id = user.id.to_string();

    let denied = h
        .pipeline
        .check(&h.bearer_for(&user), Route::UserUpdateRole, Some(&id), &cancel())
        .await
        .unwrap_err();
    assert!(matches!(denied.error, AuthError::InsufficientPrivilege { .. }));

    let ctx = h
        .pipeline
        .check(&h.bearer_for(&admin), Route::UserUpdateRole, Some(&id), &cancel())
        .await
        .unwrap();
    assert_eq!(ctx.user().map(|u| u.id), Some(user.id));
}

#[tokio::test]
async fn collection_routes_follow_their_rule() {
    let h = Harness::new();
    let user = h.add_user("user@example.com", "gophers", &["USER"]);
    let admin = h.add_user("admin@example.com", "gophers", &["ADMIN"]);

    for (route, user_allowed, admin_allowed) in [
        (Route::ProductCreate, true, false),
        (Route::ProductQuery, true, true),
        (Route::UserQuery, false, true),
        (Route::UserCreate, false, true),
        (Route::VProductQuery, false, true),
        (Route::TranCreate, true, false),
    ] {
        let as_user = h.pipeline.check(&h.bearer_for(&user), route, None, &cancel()).await;
        let as_admin = h.pipeline.check(&h.bearer_for(&admin), route, None, &cancel()).await;
        assert_eq!(as_user.is_ok(), user_allowed, "{route} as USER");
        assert_eq!(as_admin.is_ok(), admin_allowed, "{route} as ADMIN");
    }
}

#[tokio::test]
async fn missing_resource_is_not_authorized_not_not_found() {
    let h = Harness::new();
    let admin = h.add_user("admin@example.com", "gophers", &["ADMIN"]);

    let rejection = h
        .pipeline
        .check(&h.bearer_for(&admin), Route::ProductQueryById, Some(&Uuid::new_v4().to_string()), &cancel())
        .await
        .unwrap_err();
    assert!(matches!(rejection.error, AuthError::ResourceNotFound { kind: "product", .. }));
    assert_eq!(rejection.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(rejection.public_message(), "not authorized");
}

// ---------------------------------------------------------------------------
// Identifier validation never reaches the resolver
// ---------------------------------------------------------------------------

struct CountingResolver {
    kind: ResourceKind,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl OwnershipResolver for CountingResolver {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn resolve(&self, id: Uuid) -> warden_authn::Result<ResolvedResource> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AuthError::resource_not_found(self.kind.as_str(), id))
    }
}

fn counting_harness() -> (Harness, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let resolver = |kind| -> Arc<dyn OwnershipResolver> {
        Arc::new(CountingResolver { kind, calls: Arc::clone(&calls) })
    };
    let resolvers = Resolvers::from_parts(
        resolver(ResourceKind::User),
        resolver(ResourceKind::Product),
        resolver(ResourceKind::Home),
    )
    .unwrap();
    let h = Harness::with_resolvers(
        test_config(),
        MemoryUserStore::new(),
        MemoryProductStore::new(),
        MemoryHomeStore::new(),
        resolvers,
    );
    (h, calls)
}

#[tokio::test]
async fn invalid_id_is_bad_request_and_skips_resolver() {
    let (h, calls) = counting_harness();
    let admin = h.add_user("admin@example.com", "gophers", &["ADMIN"]);

    for route in [Route::ProductQueryById, Route::HomeUpdate, Route::UserDelete] {
        let rejection = h
            .pipeline
            .check(&h.bearer_for(&admin), route, Some("not-a-uuid"), &cancel())
            .await
            .unwrap_err();
        assert!(matches!(rejection.error, AuthError::InvalidId(_)), "{route}");
        assert_eq!(rejection.status(), StatusCode::BAD_REQUEST);
        assert_eq!(rejection.public_message(), "ID is not in its proper form");
    }

    let missing = h
        .pipeline
        .check(&h.bearer_for(&admin), Route::ProductQueryById, None, &cancel())
        .await
        .unwrap_err();
    assert!(matches!(missing.error, AuthError::InvalidId(_)));

    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let _ = h
        .pipeline
        .check(&h.bearer_for(&admin), Route::ProductQueryById, Some(&Uuid::new_v4().to_string()), &cancel())
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn collection_route_ignores_resource_id() {
    let (h, calls) = counting_harness();
    let user = h.add_user("user@example.com", "gophers", &["USER"]);

    let ctx = h
        .pipeline
        .check(&h.bearer_for(&user), Route::ProductQuery, Some("not-a-uuid"), &cancel())
        .await
        .unwrap();
    assert!(ctx.resource().is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

// ---------------------------------------------------------------------------
// Backend failures, timeouts, cancellation
// ---------------------------------------------------------------------------

struct FailingProducts;

#[async_trait]
impl ProductStore for FailingProducts {
    async fn query_by_id(&self, _id: ProductId) -> StorageResult<Option<ProductRecord>> {
        Err(StorageError::connection("database unavailable"))
    }
}

struct SlowProducts;

#[async_trait]
impl ProductStore for SlowProducts {
    async fn query_by_id(&self, _id: ProductId) -> StorageResult<Option<ProductRecord>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(None)
    }
}

fn harness_with_products(config: AuthConfig, products: Arc<dyn ProductStore>) -> Harness {
    let users = MemoryUserStore::new();
    let homes = MemoryHomeStore::new();
    let resolvers =
        Resolvers::new(Arc::new(users.clone()), products, Arc::new(homes.clone()));
    Harness::with_resolvers(config, users, MemoryProductStore::new(), homes, resolvers)
}

#[tokio::test]
async fn backend_failure_is_internal_error() {
    let h = harness_with_products(test_config(), Arc::new(FailingProducts));
    let admin = h.add_user("admin@example.com", "gophers", &["ADMIN"]);

    let rejection = h
        .pipeline
        .check(&h.bearer_for(&admin), Route::ProductDelete, Some(&Uuid::new_v4().to_string()), &cancel())
        .await
        .unwrap_err();
    assert!(matches!(rejection.error, AuthError::Backend(StorageError::Connection { .. })));
    assert_eq!(rejection.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(rejection.public_message(), "internal error");
}

#[tokio::test]
async fn slow_resolver_times_out_as_backend_error() {
    let config = AuthConfig::builder()
        .password(fast_password_config())
        .backend_timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    let h = harness_with_products(config, Arc::new(SlowProducts));
    let admin = h.add_user("admin@example.com", "gophers", &["ADMIN"]);

    let rejection = h
        .pipeline
        .check(&h.bearer_for(&admin), Route::ProductQueryById, Some(&Uuid::new_v4().to_string()), &cancel())
        .await
        .unwrap_err();
    assert!(matches!(rejection.error, AuthError::Backend(StorageError::Timeout)));
    assert_eq!(rejection.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn cancellation_aborts_a_pending_resolve() {
    let h = harness_with_products(test_config(), Arc::new(SlowProducts));
    let admin = h.add_user("admin@example.com", "gophers", &["ADMIN"]);
    let token = cancel();

    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let rejection = h
        .pipeline
        .check(&h.bearer_for(&admin), Route::ProductQueryById, Some(&Uuid::new_v4().to_string()), &token)
        .await
        .unwrap_err();
    assert!(matches!(rejection.error, AuthError::Cancelled));
}

#[tokio::test]
async fn already_cancelled_request_is_rejected_before_verification() {
    let h = Harness::new();
    let user = h.add_user("user@example.com", "gophers", &["USER"]);
    let token = cancel();
    token.cancel();

    let result = h.pipeline.authenticate(&h.bearer_for(&user), &token).await;
    assert_auth_error!(result, Cancelled);
}

// ---------------------------------------------------------------------------
// Forwarding
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_forwards_context_only_when_allowed() {
    let h = Harness::new();
    let user = h.add_user("user@example.com", "gophers", &["USER"]);
    let product = h.add_product(user.id);
    let handled = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&handled);
    let name = h
        .pipeline
        .run(&h.bearer_for(&user), Route::ProductQueryById, Some(&product.id.to_string()), &cancel(), |ctx| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            ctx.product().map(|p| p.name.clone())
        })
        .await
        .unwrap();
    assert_eq!(name.as_deref(), Some("Comic Books"));

    let counter = Arc::clone(&handled);
    let rejected = h
        .pipeline
        .run(&h.bearer_for(&user), Route::UserQuery, None, &cancel(), |_ctx| async move {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await;
    assert!(rejected.is_err());
    assert_eq!(handled.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Round trips and signature integrity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn credential_claims_round_trip_through_token() {
    let h = Harness::new();
    h.add_user("admin@example.com", "gophers", &["ADMIN", "USER"]);

    let issued =
        h.pipeline.authenticate(&basic("admin@example.com", "gophers"), &cancel()).await.unwrap();
    let token = h.issuer.issue(&issued).unwrap();
    let verified = h.pipeline.authenticate(&bearer(&token), &cancel()).await.unwrap();

    assert_eq!(verified, issued);
    assert_eq!(verified.issued_at(), issued.issued_at());
}

#[tokio::test]
async fn rotated_key_keeps_verifying_within_grace() {
    let h = Harness::new();
    let user = h.add_user("user@example.com", "gophers", &["USER"]);
    let before = h.token_for(&user);

    let (_, next) = warden_authn::testutil::test_key_record_with_private("k2");
    h.keys.rotate(next).unwrap();
    let after = h.token_for(&user);

    assert!(h.pipeline.authenticate(&bearer(&before), &cancel()).await.is_ok());
    assert!(h.pipeline.authenticate(&bearer(&after), &cancel()).await.is_ok());
    assert_eq!(warden_authn::decode_token_header(&after).unwrap().kid.as_deref(), Some("k2"));
}

fn arb_roles() -> impl Strategy<Value = RoleSet> {
    prop_oneof![
        Just(RoleSet::from([Role::Admin])),
        Just(RoleSet::from([Role::User])),
        Just(RoleSet::from([Role::Admin, Role::User])),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_issued_tokens_verify_to_equal_claims(subject in any::<u128>(), roles in arb_roles()) {
        let h = Harness::new();
        let subject = UserId::from(Uuid::from_u128(subject | 1));
        let claims = Claims::issue(subject, roles.clone(), h.config.issuer(), Utc::now(), Duration::from_secs(600)).unwrap();
        let token = h.issuer.issue(&claims).unwrap();

        let verifier = TokenVerifier::new(Arc::clone(&h.keys), &h.config);
        let verified = verifier.verify(&token).unwrap();
        prop_assert_eq!(verified.subject(), subject);
        prop_assert_eq!(verified.roles(), &roles);
    }

    #[test]
    fn prop_any_signature_bit_flip_is_bad_signature(bit in 0usize..512) {
        let h = Harness::new();
        let claims = Claims::issue(UserId::new_v4(), RoleSet::from([Role::User]), h.config.issuer(), Utc::now(), Duration::from_secs(600)).unwrap();
        let token = h.issuer.issue(&claims).unwrap();

        let (signed, signature) = token.rsplit_once('.').unwrap();
        let mut sig = URL_SAFE_NO_PAD.decode(signature).unwrap();
        prop_assert_eq!(sig.len(), 64);
        sig[bit / 8] ^= 1 << (bit % 8);
        let tampered = format!("{signed}.{}", URL_SAFE_NO_PAD.encode(&sig));

        let verifier = TokenVerifier::new(Arc::clone(&h.keys), &h.config);
        prop_assert!(matches!(verifier.verify(&tampered), Err(AuthError::BadSignature)));
    }
}
