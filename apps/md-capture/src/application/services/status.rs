//! Status Reporter
//!
//! Logs committer counters at a fixed interval. Polled from the recorder
//! loop; it never blocks and never touches data.

use std::time::{Duration, Instant};

use crate::infrastructure::storage::Committer;

/// Interval between status reports.
pub const STATUS_INTERVAL: Duration = Duration::from_secs(5);

/// Interval-gated status logger.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    enabled: bool,
    interval: Duration,
    last_report: Instant,
}

impl StatusReporter {
    /// Create a reporter whose first report is due one interval after `start`.
    #[must_use]
    pub const fn new(enabled: bool, start: Instant) -> Self {
        Self::with_interval(enabled, STATUS_INTERVAL, start)
    }

    /// Create a reporter with a custom interval.
    #[must_use]
    pub const fn with_interval(enabled: bool, interval: Duration, start: Instant) -> Self {
        Self {
            enabled,
            interval,
            last_report: start,
        }
    }

    /// Whether reporting is on.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Log and return the committer status if a report is due at `now`.
    pub fn poll(&mut self, now: Instant, committer: &Committer) -> Option<String> {
        if !self.enabled || now.saturating_duration_since(self.last_report) < self.interval {
            return None;
        }

        self.last_report = now;
        let status = committer.status();
        tracing::info!(status = %status, "Status");
        Some(status)
    }
}
