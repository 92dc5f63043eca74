// ==================================
// tests/integration/auth_flow_tests.rs
// ==================================
//! End-to-end flows through the auth service
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use identity_lib::auth::{AuthService, InMemorySessionCache};
use identity_lib::context::{CancelHandle, RequestContext};
use identity_lib::error::AppError;
use identity_lib::metrics::{Metrics, REQUEST_DURATION, SESSION_ACTIVE, SESSION_REVOKED, SESSION_SAVED};
use identity_lib::storage::{CredentialStore, FlatFileCredentialStore, InMemoryCredentialStore, UserRecord};
use tempfile::TempDir;

use crate::test_utils::{
    build_auth, build_auth_with_cache, build_auth_with_ttl, issuer, login_req, register_req,
    TestRecorder,
};

async fn scenario(auth: &dyn AuthService) {
    let ctx = RequestContext::background();

    let u1 = auth
        .register(&ctx, register_req("a@x.com", "pw123", "Al"))
        .await
        .unwrap();

    let session = auth.login(&ctx, login_req("a@x.com", "pw123")).await.unwrap();
    assert_eq!(session.user_id, u1);
    assert_eq!(issuer().verify_subject(&session.token).unwrap(), u1);

    let profile = auth.get_info_by_token(&ctx, &session.token).await.unwrap();
    assert_eq!(profile.email, "a@x.com");
    assert_eq!(profile.nickname, "Al");
    assert_eq!(profile.user_id, u1);

    assert!(matches!(
        auth.login(&ctx, login_req("a@x.com", "wrong")).await,
        Err(AppError::InvalidCredentials)
    ));
    assert!(matches!(
        auth.register(&ctx, register_req("a@x.com", "pw456", "Al2")).await,
        Err(AppError::AlreadyExists)
    ));
}

#[tokio::test]
async fn test_scenario_in_memory() {
    let auth = build_auth(Arc::new(InMemoryCredentialStore::new()), Metrics::noop());
    scenario(&auth).await;
}

#[tokio::test]
async fn test_scenario_flat_file() {
    let temp_dir = TempDir::new().unwrap();
    let store = FlatFileCredentialStore::new(temp_dir.path()).unwrap();
    let auth = build_auth(Arc::new(store), Metrics::noop());
    scenario(&auth).await;
}

#[tokio::test]
async fn test_login_does_not_reveal_registered_emails() {
    let auth = build_auth(Arc::new(InMemoryCredentialStore::new()), Metrics::noop());
    let ctx = RequestContext::background();
    auth.register(&ctx, register_req("a@x.com", "pw123", "Al"))
        .await
        .unwrap();

    let wrong_password = auth.login(&ctx, login_req("a@x.com", "pw124")).await.unwrap_err();
    let unknown_email = auth.login(&ctx, login_req("nobody@x.com", "pw123")).await.unwrap_err();

    assert_eq!(wrong_password.error_code(), unknown_email.error_code());
    assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    assert_eq!(wrong_password.sanitized_message(), unknown_email.sanitized_message());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_single_winner() {
    let temp_dir = TempDir::new().unwrap();
    let stores: Vec<Arc<dyn CredentialStore>> = vec![
        Arc::new(InMemoryCredentialStore::new()),
        Arc::new(FlatFileCredentialStore::new(temp_dir.path()).unwrap()),
    ];

    for store in stores {
        let auth = Arc::new(build_auth(store, Metrics::noop()));

        for round in 0..25 {
            let email = format!("race-{round}@x.com");
            let handles: Vec<_> = (0..12)
                .map(|i| {
                    let auth = auth.clone();
                    let email = email.clone();
                    tokio::spawn(async move {
                        auth.register(
                            &RequestContext::background(),
                            register_req(&email, "pw123", &format!("racer-{i}")),
                        )
                        .await
                    })
                })
                .collect();

            let mut winners = Vec::new();
            for result in join_all(handles).await {
                match result.unwrap() {
                    Ok(id) => winners.push(id),
                    Err(AppError::AlreadyExists) => {},
                    Err(other) => panic!("round {round}: unexpected error: {other:?}"),
                }
            }
            assert_eq!(winners.len(), 1, "round {round}");

            let session = auth
                .login(&RequestContext::background(), login_req(&email, "pw123"))
                .await
                .unwrap();
            assert_eq!(session.user_id, winners[0]);
        }
    }
}

#[tokio::test]
async fn test_zero_ttl_tokens_are_rejected() {
    let auth = build_auth_with_ttl(
        Arc::new(InMemoryCredentialStore::new()),
        Metrics::noop(),
        Duration::ZERO,
    );
    let ctx = RequestContext::background();
    auth.register(&ctx, register_req("a@x.com", "pw123", "Al"))
        .await
        .unwrap();

    let session = auth.login(&ctx, login_req("a@x.com", "pw123")).await.unwrap();
    assert!(matches!(
        auth.get_info_by_token(&ctx, &session.token).await,
        Err(AppError::Unauthenticated(_))
    ));
}

#[tokio::test]
async fn test_revoked_token_rejected_when_enforced() {
    let cache = Arc::new(InMemorySessionCache::new(Metrics::noop()));
    let auth = build_auth_with_cache(Arc::new(InMemoryCredentialStore::new()), cache.clone(), true);
    let ctx = RequestContext::background();

    let id = auth
        .register(&ctx, register_req("a@x.com", "pw123", "Al"))
        .await
        .unwrap();
    let first = auth.login(&ctx, login_req("a@x.com", "pw123")).await.unwrap();
    let second = auth.login(&ctx, login_req("a@x.com", "pw123")).await.unwrap();
    assert_eq!(cache.subject_of(&first.token).as_deref(), Some(id.as_str()));

    auth.logout(&ctx, &first.token).await.unwrap();

    assert!(matches!(
        auth.get_info_by_token(&ctx, &first.token).await,
        Err(AppError::Unauthenticated(_))
    ));
    // Other sessions of the same user are untouched.
    assert_eq!(auth.get_info_by_token(&ctx, &second.token).await.unwrap().user_id, id);
    // Identifier lookups trust upstream authentication and ignore the cache.
    assert!(auth.get_info_by_id(&ctx, &id).await.is_ok());
}

#[tokio::test]
async fn test_unknown_user_id_not_found() {
    let auth = build_auth(Arc::new(InMemoryCredentialStore::new()), Metrics::noop());
    let ctx = RequestContext::background();

    assert!(matches!(
        auth.get_info_by_id(&ctx, "0b7f7a4e-1c1d-4a53-9e59-2f5f3e4b6c7d").await,
        Err(AppError::NotFound(_))
    ));

    // A valid token for a subject that has no record.
    let token = issuer().issue("ghost", Duration::from_secs(60)).unwrap().token;
    assert!(matches!(
        auth.get_info_by_token(&ctx, &token).await,
        Err(AppError::NotFound(_))
    ));
}

/// Store that cancels the request as soon as the duplicate pre-check has run,
/// so cancellation lands while the password is being hashed.
struct CancelAfterPrecheck {
    inner: InMemoryCredentialStore,
    handle: CancelHandle,
}

#[async_trait]
impl CredentialStore for CancelAfterPrecheck {
    async fn create(&self, ctx: &RequestContext, record: UserRecord) -> Result<String, AppError> {
        self.inner.create(ctx, record).await
    }

    async fn get_by_email(&self, ctx: &RequestContext, email: &str) -> Result<UserRecord, AppError> {
        let result = self.inner.get_by_email(ctx, email).await;
        self.handle.cancel();
        result
    }

    async fn get_by_id(&self, ctx: &RequestContext, id: &str) -> Result<UserRecord, AppError> {
        self.inner.get_by_id(ctx, id).await
    }
}

#[tokio::test]
async fn test_cancelled_during_hashing_commits_nothing() {
    let (ctx, handle) = RequestContext::new();
    let store = Arc::new(CancelAfterPrecheck {
        inner: InMemoryCredentialStore::new(),
        handle,
    });
    let auth = build_auth(store.clone(), Metrics::noop());

    let result = auth.register(&ctx, register_req("a@x.com", "pw123", "Al")).await;
    assert!(matches!(result, Err(AppError::Cancelled)));
    assert!(store.inner.is_empty());
}

#[tokio::test]
async fn test_expired_deadline_fails_fast() {
    let auth = build_auth(Arc::new(InMemoryCredentialStore::new()), Metrics::noop());
    let ctx = RequestContext::background().with_timeout(Duration::ZERO);

    assert!(matches!(
        auth.register(&ctx, register_req("a@x.com", "pw123", "Al")).await,
        Err(AppError::DeadlineExceeded)
    ));
}

#[tokio::test]
async fn test_metrics_are_recorded_on_injected_recorder() {
    let recorder = TestRecorder::new();
    let metrics = Metrics::new(recorder.clone());
    let cache = Arc::new(InMemorySessionCache::new(metrics.clone()));
    let auth = build_auth(Arc::new(InMemoryCredentialStore::new()), metrics)
        .with_session_cache(cache, false);
    let ctx = RequestContext::background();

    auth.register(&ctx, register_req("a@x.com", "pw123", "Al"))
        .await
        .unwrap();
    let session = auth.login(&ctx, login_req("a@x.com", "pw123")).await.unwrap();
    let _ = auth.login(&ctx, login_req("a@x.com", "nope")).await;
    auth.logout(&ctx, &session.token).await.unwrap();

    let key = |method: &str, status: &str| {
        format!("{REQUEST_DURATION}{{method={method},status={status}}}")
    };
    assert_eq!(recorder.histogram_count(&key("register", "success")), 1);
    assert_eq!(recorder.histogram_count(&key("login", "success")), 1);
    assert_eq!(recorder.histogram_count(&key("login", "error")), 1);
    assert_eq!(recorder.histogram_count(&key("logout", "success")), 1);

    assert_eq!(recorder.counter(SESSION_SAVED), 1);
    assert_eq!(recorder.counter(SESSION_REVOKED), 1);
    assert_eq!(recorder.gauge(SESSION_ACTIVE), Some(0.0));
}
