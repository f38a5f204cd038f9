//! Reconnection Policy
//!
//! The delay before reconnect attempt `n` is `n` time units: the first
//! reconnect is immediate, the second waits one unit, and so on. The
//! attempt counter is never reset, so a long-lived recorder that has
//! reconnected many times waits longer on its next failure.
//!
//! The delay computation is a [`BackoffStrategy`], a pure function from
//! attempt count to delay, so schedules can be checked without sleeping.

use std::time::Duration;

/// Pure mapping from prior attempt count to delay.
pub trait BackoffStrategy {
    /// Delay to wait before the attempt that follows `attempt` prior ones.
    fn delay(&self, attempt: u32) -> Duration;
}

impl<F> BackoffStrategy for F
where
    F: Fn(u32) -> Duration,
{
    fn delay(&self, attempt: u32) -> Duration {
        self(attempt)
    }
}

/// Linear backoff: `unit * attempt`, optionally capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBackoff {
    /// Delay added per prior attempt.
    pub unit: Duration,
    /// Upper bound on the delay (`None` = unbounded).
    pub max: Option<Duration>,
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self {
            unit: Duration::from_secs(1),
            max: None,
        }
    }
}

impl LinearBackoff {
    /// Create an unbounded linear backoff.
    #[must_use]
    pub const fn new(unit: Duration) -> Self {
        Self { unit, max: None }
    }

    /// Cap the delay at `max`.
    #[must_use]
    pub const fn with_max(mut self, max: Duration) -> Self {
        self.max = Some(max);
        self
    }
}

impl BackoffStrategy for LinearBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let delay = self.unit.saturating_mul(attempt);
        match self.max {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

/// Tracks reconnect attempts and hands out delays.
pub struct ReconnectPolicy {
    strategy: Box<dyn BackoffStrategy + Send + Sync>,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a policy over `strategy`.
    #[must_use]
    pub fn new(strategy: impl BackoffStrategy + Send + Sync + 'static) -> Self {
        Self {
            strategy: Box::new(strategy),
            attempt_count: 0,
        }
    }

    /// Delay for the next attempt; counts that attempt.
    ///
    /// The count advances whether or not the attempt later succeeds.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.strategy.delay(self.attempt_count);
        self.attempt_count = self.attempt_count.saturating_add(1);
        delay
    }

    /// Attempts handed out so far.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(LinearBackoff::default())
    }
}

impl std::fmt::Debug for ReconnectPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectPolicy")
            .field("attempt_count", &self.attempt_count)
            .finish_non_exhaustive()
    }
}
