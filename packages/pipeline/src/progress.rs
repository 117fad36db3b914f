//! Progress reporting for pipeline runs.
//!
//! One unit of work is one geocode lookup (the department address plus
//! each capped incident). Renderers live elsewhere: the CLI drives
//! `indicatif` bars, the server stays silent.

use std::sync::Arc;

/// Receives progress updates from a running pipeline.
///
/// Implementations must be `Send + Sync` so a run can report from a
/// spawned tokio task.
pub trait ProgressCallback: Send + Sync {
    /// Set the total number of lookups the run will attempt.
    fn set_total(&self, total: u64);

    /// Advance by `delta` completed lookups.
    fn inc(&self, delta: u64);

    /// Update the message shown alongside the indicator.
    fn set_message(&self, msg: String);

    /// Mark the run complete with a final message.
    fn finish(&self, msg: String);

    /// Mark the run complete and remove the indicator.
    fn finish_and_clear(&self);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
    fn finish_and_clear(&self) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
