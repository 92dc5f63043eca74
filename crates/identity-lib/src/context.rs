//! Per-request cancellation, deadline and correlation id.
//!
//! Every call that reaches a store takes a [`RequestContext`]. Nothing here is
//! ambient: the transport layer builds a context per request and passes it down.
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::AppError;

/// Cancellation, deadline and correlation id for a single request
#[derive(Clone, Debug)]
pub struct RequestContext {
    correlation_id: String,
    deadline: Option<Instant>,
    cancelled: watch::Receiver<bool>,
}

/// Cancels every [`RequestContext`] cloned from the context it was created with
#[derive(Clone, Debug)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl RequestContext {
    /// A cancellable context without a deadline
    pub fn new() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let ctx = Self {
            correlation_id: Uuid::new_v4().to_string(),
            deadline: None,
            cancelled: rx,
        };
        (ctx, CancelHandle { tx: Arc::new(tx) })
    }

    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        // Dropping the sender leaves the receiver permanently un-cancelled.
        Self::new().0
    }

    /// A timeout too large to represent leaves the context without a new deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Set a deadline. An earlier existing deadline wins.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = id.into();
        self
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Fail fast if the request was cancelled or its deadline has passed
    pub fn check(&self) -> Result<(), AppError> {
        if self.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(AppError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Resolves once the context is cancelled; pending forever otherwise
    pub async fn cancelled(&self) {
        let mut rx = self.cancelled.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Drive `fut` to completion unless the context is cancelled or times out first.
    ///
    /// The future is dropped on cancellation, so it must not leave partial
    /// writes behind when interrupted at an `.await` point.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        self.check()?;

        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.cancelled() => Err(AppError::Cancelled),
                res = tokio::time::timeout_at(deadline, fut) => match res {
                    Ok(inner) => inner,
                    Err(_) => Err(AppError::DeadlineExceeded),
                },
            },
            None => tokio::select! {
                biased;
                _ = self.cancelled() => Err(AppError::Cancelled),
                res = fut => res,
            },
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::background()
    }
}
