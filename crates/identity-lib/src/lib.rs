// ============================
// crates/identity-lib/src/lib.rs
// ============================
//! Core identity functionality for the campus-trading platform: registration,
//! login and bearer session tokens.

pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod router;
pub mod storage;
pub mod validation;

use std::sync::Arc;

use crate::auth::{AuthService, DefaultAuth, InMemorySessionCache, PasswordHasher, TokenIssuer};
use crate::config::{Settings, StorageBackend};
use crate::metrics::Metrics;
use crate::storage::{CredentialStore, FlatFileCredentialStore, InMemoryCredentialStore};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Authentication service
    pub auth: Arc<dyn AuthService>,
    /// Session cache, when enabled; the binary drives its cleanup sweep
    pub sessions: Option<InMemorySessionCache>,
    /// Settings the state was built from
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Build the service graph described by `settings`
    pub fn new(settings: Settings, metrics: Metrics) -> anyhow::Result<Self> {
        Self::with_hasher(settings, metrics, PasswordHasher::new())
    }

    /// Like [`AppState::new`] with an explicit password hasher
    pub fn with_hasher(
        settings: Settings,
        metrics: Metrics,
        hasher: PasswordHasher,
    ) -> anyhow::Result<Self> {
        settings.validate()?;

        let store: Arc<dyn CredentialStore> = match settings.storage.backend {
            StorageBackend::Memory => Arc::new(InMemoryCredentialStore::new()),
            StorageBackend::File => Arc::new(FlatFileCredentialStore::new(&settings.storage.path)?),
        };
        let issuer = TokenIssuer::new(settings.jwt.secret.as_bytes())?;

        let mut auth = DefaultAuth::new(store, hasher, issuer, settings.token_ttl(), metrics.clone());

        let sessions = if settings.session_cache.enabled {
            let cache = InMemorySessionCache::new(metrics);
            auth = auth.with_session_cache(
                Arc::new(cache.clone()),
                settings.session_cache.enforce_liveness,
            );
            Some(cache)
        } else {
            None
        };

        tracing::debug!(
            backend = ?settings.storage.backend,
            session_cache = sessions.is_some(),
            "application state built"
        );

        Ok(Self {
            auth: Arc::new(auth),
            sessions,
            settings: Arc::new(settings),
        })
    }
}
