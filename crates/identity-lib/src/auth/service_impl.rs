use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use campus_identity_common::{LoginRequest, RegisterRequest, UserProfile};
use chrono::Utc;
use tokio::sync::OnceCell;
use tracing::field::Empty;
use zeroize::Zeroizing;

use crate::auth::{AuthService, Claims, IssuedSession, PasswordHasher, SessionCache, TokenIssuer};
use crate::context::RequestContext;
use crate::error::AppError;
use crate::metrics::{Metrics, STATUS_ERROR, STATUS_SUCCESS};
use crate::storage::{new_user_id, CredentialStore, UserRecord};
use crate::validation::require_non_empty;

/// Default token lifetime
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Password hashed once per service and verified against on unknown emails,
/// so both login failures pay for one Argon2 verify.
const DUMMY_PASSWORD: &str = "campus-identity-unknown-account";

/// Stateless orchestration of the store, hasher, issuer and optional session cache
pub struct DefaultAuth {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    issuer: TokenIssuer,
    sessions: Option<Arc<dyn SessionCache>>,
    enforce_liveness: bool,
    token_ttl: Duration,
    metrics: Metrics,
    dummy_hash: OnceCell<String>,
}

impl DefaultAuth {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        issuer: TokenIssuer,
        token_ttl: Duration,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            hasher,
            issuer,
            sessions: None,
            enforce_liveness: false,
            token_ttl,
            metrics,
            dummy_hash: OnceCell::new(),
        }
    }

    /// Record issued tokens in `cache`. With `enforce_liveness`, tokens without a
    /// live entry are rejected even if their signature and expiry are fine.
    pub fn with_session_cache(mut self, cache: Arc<dyn SessionCache>, enforce_liveness: bool) -> Self {
        self.sessions = Some(cache);
        self.enforce_liveness = enforce_liveness;
        self
    }

    async fn hash_password(&self, password: Zeroizing<String>) -> Result<String, AppError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password)).await?
    }

    async fn verify_password(&self, password: Zeroizing<String>, hash: String) -> Result<bool, AppError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash)).await?
    }

    /// Burn one verify against a hash made with this service's parameters.
    async fn verify_dummy(&self, password: Zeroizing<String>) -> Result<(), AppError> {
        let hash = self
            .dummy_hash
            .get_or_try_init(|| self.hash_password(Zeroizing::new(DUMMY_PASSWORD.to_string())))
            .await?
            .clone();
        self.verify_password(password, hash).await?;
        Ok(())
    }

    /// Signature and expiry only
    fn verify_token(&self, token: &str) -> Result<Claims, AppError> {
        if token.trim().is_empty() {
            return Err(AppError::Unauthenticated("missing token".to_string()));
        }
        self.issuer
            .verify(token)
            .map_err(|e| AppError::Unauthenticated(e.to_string()))
    }

    fn observe<T>(&self, method: &'static str, started: Instant, result: &Result<T, AppError>) {
        let status = if result.is_ok() { STATUS_SUCCESS } else { STATUS_ERROR };
        self.metrics.record_request(method, status, started.elapsed());
    }

    async fn do_register(&self, ctx: &RequestContext, req: RegisterRequest) -> Result<String, AppError> {
        let password = Zeroizing::new(req.password);
        require_non_empty(&[
            ("email", req.email.as_str()),
            ("password", password.as_str()),
            ("nickname", req.nickname.as_str()),
        ])?;

        match self.store.get_by_email(ctx, &req.email).await {
            Ok(_) => return Err(AppError::AlreadyExists),
            Err(AppError::NotFound(_)) => {},
            Err(e) => return Err(e),
        }

        let password_hash = self.hash_password(password).await?;

        let record = UserRecord {
            id: new_user_id(),
            email: req.email,
            password_hash,
            nickname: req.nickname,
            avatar: req.avatar,
            created_at: Utc::now(),
            deleted_at: None,
        };

        // Hashing may have outlived the request; commit nothing in that case.
        ctx.check()?;
        let user_id = self.store.create(ctx, record).await?;

        tracing::Span::current().record("user_id", user_id.as_str());
        tracing::info!("user registered");
        Ok(user_id)
    }

    async fn do_login(&self, ctx: &RequestContext, req: LoginRequest) -> Result<IssuedSession, AppError> {
        let password = Zeroizing::new(req.password);
        require_non_empty(&[("email", req.email.as_str()), ("password", password.as_str())])?;

        let record = match self.store.get_by_email(ctx, &req.email).await {
            Ok(record) => record,
            Err(AppError::NotFound(_)) => {
                self.verify_dummy(password).await?;
                tracing::debug!("login rejected: unknown email");
                return Err(AppError::InvalidCredentials);
            },
            Err(e) => return Err(e),
        };

        if !self.verify_password(password, record.password_hash).await? {
            tracing::debug!("login rejected: password mismatch");
            return Err(AppError::InvalidCredentials);
        }

        let issued = self
            .issuer
            .issue(&record.id, self.token_ttl)
            .map_err(|e| AppError::Internal(format!("token issuance failed: {e}")))?;

        if let Some(sessions) = &self.sessions {
            sessions
                .save(ctx, &record.id, &issued.token, self.token_ttl)
                .await?;
        }

        tracing::Span::current().record("user_id", record.id.as_str());
        tracing::info!(expires_at = issued.claims.exp, "session issued");

        Ok(IssuedSession {
            token: issued.token,
            user_id: record.id,
            expires_at: issued.claims.exp,
        })
    }

    async fn do_authenticate(&self, ctx: &RequestContext, token: &str) -> Result<Claims, AppError> {
        ctx.check()?;
        let claims = self.verify_token(token)?;

        if self.enforce_liveness {
            if let Some(sessions) = &self.sessions {
                if !sessions.is_live(ctx, token).await? {
                    return Err(AppError::Unauthenticated(
                        "session revoked or expired".to_string(),
                    ));
                }
            }
        }

        tracing::Span::current().record("user_id", claims.sub.as_str());
        Ok(claims)
    }
}

#[async_trait]
impl AuthService for DefaultAuth {
    #[tracing::instrument(
        name = "register",
        skip_all,
        fields(correlation_id = %ctx.correlation_id(), email = %req.email, user_id = Empty)
    )]
    async fn register(&self, ctx: &RequestContext, req: RegisterRequest) -> Result<String, AppError> {
        let started = Instant::now();
        let result = self.do_register(ctx, req).await;
        self.observe("register", started, &result);
        result
    }

    #[tracing::instrument(
        name = "login",
        skip_all,
        fields(correlation_id = %ctx.correlation_id(), email = %req.email, user_id = Empty)
    )]
    async fn login(&self, ctx: &RequestContext, req: LoginRequest) -> Result<IssuedSession, AppError> {
        let started = Instant::now();
        let result = self.do_login(ctx, req).await;
        self.observe("login", started, &result);
        result
    }

    #[tracing::instrument(
        name = "authenticate",
        skip_all,
        fields(correlation_id = %ctx.correlation_id(), user_id = Empty)
    )]
    async fn authenticate(&self, ctx: &RequestContext, token: &str) -> Result<Claims, AppError> {
        let started = Instant::now();
        let result = self.do_authenticate(ctx, token).await;
        self.observe("authenticate", started, &result);
        result
    }

    #[tracing::instrument(
        name = "get_info_by_token",
        skip_all,
        fields(correlation_id = %ctx.correlation_id(), user_id = Empty)
    )]
    async fn get_info_by_token(&self, ctx: &RequestContext, token: &str) -> Result<UserProfile, AppError> {
        let started = Instant::now();
        let result = async {
            let claims = self.do_authenticate(ctx, token).await?;
            let record = self.store.get_by_id(ctx, &claims.sub).await?;
            Ok::<_, AppError>(record.profile())
        }
        .await;
        self.observe("get_info_by_token", started, &result);
        result
    }

    #[tracing::instrument(
        name = "get_info_by_id",
        skip_all,
        fields(correlation_id = %ctx.correlation_id(), user_id = %user_id)
    )]
    async fn get_info_by_id(&self, ctx: &RequestContext, user_id: &str) -> Result<UserProfile, AppError> {
        let started = Instant::now();
        let result = async {
            require_non_empty(&[("user_id", user_id)])?;
            let record = self.store.get_by_id(ctx, user_id).await?;
            Ok::<_, AppError>(record.profile())
        }
        .await;
        self.observe("get_info_by_id", started, &result);
        result
    }

    #[tracing::instrument(
        name = "logout",
        skip_all,
        fields(correlation_id = %ctx.correlation_id(), user_id = Empty)
    )]
    async fn logout(&self, ctx: &RequestContext, token: &str) -> Result<(), AppError> {
        let started = Instant::now();
        let result = async {
            ctx.check()?;
            // No liveness check: logging out an already revoked session is fine.
            let claims = self.verify_token(token)?;
            tracing::Span::current().record("user_id", claims.sub.as_str());
            if let Some(sessions) = &self.sessions {
                sessions.revoke(ctx, token).await?;
            }
            tracing::info!("session revoked");
            Ok::<_, AppError>(())
        }
        .await;
        self.observe("logout", started, &result);
        result
    }
}

impl fmt::Debug for DefaultAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultAuth")
            .field("hasher", &self.hasher)
            .field("issuer", &self.issuer)
            .field("session_cache", &self.sessions.is_some())
            .field("enforce_liveness", &self.enforce_liveness)
            .field("token_ttl", &self.token_ttl)
            .finish_non_exhaustive()
    }
}
