// ============================
// crates/identity-lib/src/metrics.rs
// ============================
//! Metric keys and the injected recorder handle.
//!
//! Nothing registers with a global recorder: whoever builds the service hands
//! it a [`Metrics`] wrapping the recorder of their choice.
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use metrics::{Key, Label, Level, Metadata, NoopRecorder, Recorder};

pub const REQUEST_DURATION: &str = "identity.request.duration_seconds";
pub const SESSION_SAVED: &str = "identity.session.saved";
pub const SESSION_REVOKED: &str = "identity.session.revoked";
pub const SESSION_EXPIRED: &str = "identity.session.expired";
pub const SESSION_ACTIVE: &str = "identity.session.active";

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_ERROR: &str = "error";

fn metadata() -> Metadata<'static> {
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()))
}

/// Cloneable handle to an explicitly provided metrics recorder
#[derive(Clone)]
pub struct Metrics {
    recorder: Arc<dyn Recorder + Send + Sync>,
}

impl Metrics {
    pub fn new(recorder: Arc<dyn Recorder + Send + Sync>) -> Self {
        Self { recorder }
    }

    /// Discards everything
    pub fn noop() -> Self {
        Self::new(Arc::new(NoopRecorder))
    }

    /// Observe the latency of one service operation
    pub fn record_request(&self, method: &'static str, status: &'static str, elapsed: Duration) {
        let key = Key::from_parts(
            REQUEST_DURATION,
            vec![Label::new("method", method), Label::new("status", status)],
        );
        self.recorder
            .register_histogram(&key, &metadata())
            .record(elapsed.as_secs_f64());
    }

    pub fn increment(&self, name: &'static str, value: u64) {
        self.recorder
            .register_counter(&Key::from_static_name(name), &metadata())
            .increment(value);
    }

    pub fn set_gauge(&self, name: &'static str, value: f64) {
        self.recorder
            .register_gauge(&Key::from_static_name(name), &metadata())
            .set(value);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}
