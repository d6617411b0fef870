// libs/appointment-cell/src/services/policy.rs
use chrono::{DateTime, Duration, FixedOffset};

use shared_config::AppConfig;

/// Decides whether a cancellation falls inside the late-cancellation window.
/// A total function over two instants - no state, no failure modes, and no
/// knowledge of who is cancelling.
#[derive(Debug, Clone)]
pub struct CancellationPolicy {
    late_window: Duration,
}

impl Default for CancellationPolicy {
    fn default() -> Self {
        Self {
            late_window: Duration::hours(shared_config::DEFAULT_LATE_CANCELLATION_WINDOW_HOURS),
        }
    }
}

impl CancellationPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::with_window_hours(config.late_cancellation_window_hours)
    }

    pub fn with_window_hours(hours: i64) -> Self {
        Self {
            late_window: Duration::hours(hours),
        }
    }

    pub fn late_window(&self) -> Duration {
        self.late_window
    }

    /// Late iff less than the window remains before the scheduled time.
    /// Exactly the window boundary is on-time.
    pub fn is_late(
        &self,
        scheduled_at: DateTime<FixedOffset>,
        cancelled_at: DateTime<FixedOffset>,
    ) -> bool {
        scheduled_at.signed_duration_since(cancelled_at) < self.late_window
    }
}
