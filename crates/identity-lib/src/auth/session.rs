// ============================
// crates/identity-lib/src/auth/session.rs
// ============================
//! Session cache: server-side record of issued tokens with a TTL.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::context::RequestContext;
use crate::error::AppError;
use crate::metrics::{Metrics, SESSION_ACTIVE, SESSION_EXPIRED, SESSION_REVOKED, SESSION_SAVED};

/// Secondary store of live sessions, enabling revocation before token expiry.
///
/// Liveness is advisory: a missing entry only invalidates a token when the
/// service is configured to enforce it.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Record `token` for `subject`. Replaces any existing entry for the same token.
    async fn save(
        &self,
        ctx: &RequestContext,
        subject: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<(), AppError>;

    /// Whether an unexpired entry exists for `token`
    async fn is_live(&self, ctx: &RequestContext, token: &str) -> Result<bool, AppError>;

    /// Drop the entry for `token`. Revoking an unknown token is not an error.
    async fn revoke(&self, ctx: &RequestContext, token: &str) -> Result<(), AppError>;
}

/// Session information
#[derive(Clone, Debug)]
pub struct SessionEntry {
    pub subject: String,
    pub expires_at: Instant,
}

impl SessionEntry {
    fn is_live_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-process session cache keyed by token
#[derive(Clone, Debug)]
pub struct InMemorySessionCache {
    sessions: Arc<DashMap<String, SessionEntry>>,
    metrics: Metrics,
}

impl InMemorySessionCache {
    pub fn new(metrics: Metrics) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            metrics,
        }
    }

    /// Number of entries, expired ones included until the next sweep
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Owner of a live session, if any
    pub fn subject_of(&self, token: &str) -> Option<String> {
        let now = Instant::now();
        self.sessions
            .get(token)
            .filter(|entry| entry.is_live_at(now))
            .map(|entry| entry.subject.clone())
    }

    /// Remove expired entries, returning how many were dropped
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| entry.is_live_at(now));
        let after = self.sessions.len();
        let removed = before.saturating_sub(after);

        if removed > 0 {
            self.metrics.increment(SESSION_EXPIRED, removed as u64);
            self.metrics.set_gauge(SESSION_ACTIVE, after as f64);
            tracing::debug!(removed, remaining = after, "expired sessions purged");
        }
        removed
    }

    /// Spawn the periodic sweep. Abort the handle to stop it.
    pub fn spawn_cleanup(&self, interval: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.cleanup_expired();
            }
        })
    }
}

#[async_trait]
impl SessionCache for InMemorySessionCache {
    async fn save(
        &self,
        ctx: &RequestContext,
        subject: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<(), AppError> {
        ctx.check()?;

        let entry = SessionEntry {
            subject: subject.to_string(),
            expires_at: Instant::now() + ttl,
        };
        self.sessions.insert(token.to_string(), entry);

        self.metrics.increment(SESSION_SAVED, 1);
        self.metrics.set_gauge(SESSION_ACTIVE, self.sessions.len() as f64);
        Ok(())
    }

    async fn is_live(&self, ctx: &RequestContext, token: &str) -> Result<bool, AppError> {
        ctx.check()?;

        let now = Instant::now();
        let live = match self.sessions.get(token) {
            Some(entry) => entry.is_live_at(now),
            None => return Ok(false),
        };

        if !live {
            self.sessions.remove_if(token, |_, entry| !entry.is_live_at(now));
        }
        Ok(live)
    }

    async fn revoke(&self, ctx: &RequestContext, token: &str) -> Result<(), AppError> {
        ctx.check()?;

        if self.sessions.remove(token).is_some() {
            self.metrics.increment(SESSION_REVOKED, 1);
            self.metrics.set_gauge(SESSION_ACTIVE, self.sessions.len() as f64);
        }
        Ok(())
    }
}
