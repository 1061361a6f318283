//! Bracketed capture sessions.

use std::sync::Arc;

use chrono::Duration;

use super::diff::{diff_snapshots, StateDiff};
use super::snapshot::{StateSnapshot, StateSource};

/// Captures a snapshot at session start and again at `finish`, yielding the
/// diff over the whole interval. Useful for "what did this interaction
/// actually change" bookkeeping around a block of work.
pub struct CaptureSession {
    source: Arc<dyn StateSource>,
    start: StateSnapshot,
}

impl CaptureSession {
    /// Start a session by capturing the current state.
    pub async fn begin(source: Arc<dyn StateSource>) -> Self {
        let start = source.capture_snapshot().await;
        Self { source, start }
    }

    /// The snapshot taken at session start.
    pub fn start_snapshot(&self) -> &StateSnapshot {
        &self.start
    }

    /// Capture the end snapshot and return the diff and elapsed capture span.
    pub async fn finish(self) -> (StateDiff, Duration) {
        let end = self.source.capture_snapshot().await;
        let elapsed = end.timestamp - self.start.timestamp;
        (diff_snapshots(&self.start, &end), elapsed)
    }
}
