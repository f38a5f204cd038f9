//! Recorder Loop
//!
//! Single-threaded cooperative loop that drives one feed connection into
//! the committer.
//!
//! # State Machine
//!
//! ```text
//! Starting ──► Connecting ──► Subscribed ──┐
//!                  ▲                        │ read failure
//!                  └────── Disconnected ◄───┘
//!
//! any state ──(rollover | fatal error)──► ShuttingDown ──► Stopped
//! ```
//!
//! # Iteration
//!
//! 1. Stop if the local date differs from the capture date.
//! 2. If disconnected, sleep for the backoff delay, reconnect, start over.
//! 3. Emit a status report if one is due.
//! 4. Wait for the next frame and dispatch it.
//!
//! Every exit path closes the connection and then the committer.

use std::time::Instant;

use chrono::NaiveDate;
use thiserror::Error;

use super::dispatcher::{DispatchError, MessageDispatcher};
use super::status::StatusReporter;
use crate::application::ports::{Clock, FeedTransport, ReadOutcome};
use crate::infrastructure::coinbase::ReconnectPolicy;
use crate::infrastructure::storage::{CommitError, Committer};

/// Fatal recorder failures.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// A frame could not be decoded or persisted.
    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    /// Output could not be flushed at shutdown.
    #[error("shutdown failed: {0}")]
    Shutdown(#[from] CommitError),
}

/// Why the loop stopped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The local date moved past the capture date.
    Rollover {
        /// Date the output files are stamped with.
        capture_date: NaiveDate,
        /// Date observed when stopping.
        today: NaiveDate,
    },
}

/// Recorder lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecorderState {
    /// Not yet run.
    #[default]
    Starting,
    /// Dialing and subscribing.
    Connecting,
    /// Streaming frames.
    Subscribed,
    /// Waiting to reconnect.
    Disconnected,
    /// Closing connection and output.
    ShuttingDown,
    /// Finished.
    Stopped,
}

impl RecorderState {
    /// Get the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Connecting => "connecting",
            Self::Subscribed => "subscribed",
            Self::Disconnected => "disconnected",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
        }
    }
}

/// Drives a [`FeedTransport`] into a [`Committer`].
pub struct Recorder<T, C> {
    transport: T,
    committer: Committer,
    dispatcher: MessageDispatcher,
    policy: ReconnectPolicy,
    status: StatusReporter,
    clock: C,
    state: RecorderState,
}

impl<T, C> Recorder<T, C>
where
    T: FeedTransport,
    C: Clock,
{
    /// Assemble a recorder.
    #[must_use]
    pub fn new(
        transport: T,
        committer: Committer,
        dispatcher: MessageDispatcher,
        policy: ReconnectPolicy,
        status: StatusReporter,
        clock: C,
    ) -> Self {
        Self {
            transport,
            committer,
            dispatcher,
            policy,
            status,
            clock,
            state: RecorderState::Starting,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> RecorderState {
        self.state
    }

    /// The committer.
    #[must_use]
    pub const fn committer(&self) -> &Committer {
        &self.committer
    }

    /// The transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// The reconnect policy.
    #[must_use]
    pub const fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Run until rollover or a fatal error, then shut down.
    ///
    /// # Errors
    ///
    /// Returns an error when a frame cannot be decoded or persisted, or when
    /// output cannot be flushed at shutdown. The shutdown sequence has run
    /// in either case.
    pub async fn run(&mut self) -> Result<StopReason, RecorderError> {
        let outcome = self.stream().await;

        self.state = RecorderState::ShuttingDown;
        match &outcome {
            Ok(reason) => tracing::info!(reason = ?reason, "Recorder stopping"),
            Err(e) => tracing::error!(error = %e, "Recorder stopping on fatal error"),
        }
        let shutdown = self.shutdown().await;
        self.state = RecorderState::Stopped;

        let reason = outcome?;
        shutdown?;
        tracing::info!(status = %self.committer.status(), "Recorder stopped");
        Ok(reason)
    }

    async fn stream(&mut self) -> Result<StopReason, RecorderError> {
        let capture_date = self.committer.layout().capture_date();
        self.connect().await;

        loop {
            let today = self.clock.today();
            if today != capture_date {
                tracing::info!(%capture_date, %today, "Daily rollover");
                return Ok(StopReason::Rollover {
                    capture_date,
                    today,
                });
            }

            if !self.transport.is_connected() {
                self.state = RecorderState::Disconnected;
                let delay = self.policy.next_delay();
                tracing::info!(
                    attempt = self.policy.attempt_count(),
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Reconnecting"
                );
                tokio::time::sleep(delay).await;
                self.connect().await;
                continue;
            }

            self.status.poll(Instant::now(), &self.committer);

            match self.transport.read_next().await {
                ReadOutcome::Text {
                    received_at,
                    payload,
                } => {
                    self.dispatcher
                        .dispatch(&mut self.committer, &received_at, payload.as_bytes())?;
                }
                ReadOutcome::Control => {}
                ReadOutcome::Disconnected { reason } => {
                    tracing::debug!(reason = %reason, "Read loop lost connection");
                    self.state = RecorderState::Disconnected;
                }
            }
        }
    }

    async fn connect(&mut self) {
        self.state = RecorderState::Connecting;
        match self.transport.connect_and_subscribe().await {
            Ok(()) => self.state = RecorderState::Subscribed,
            Err(e) => {
                tracing::warn!(error = %e, "Connect failed, will retry");
                self.state = RecorderState::Disconnected;
            }
        }
    }

    async fn shutdown(&mut self) -> Result<(), CommitError> {
        self.transport.close().await;
        self.committer.close()
    }
}

impl<T, C> std::fmt::Debug for Recorder<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("state", &self.state)
            .field("committer", &self.committer)
            .field("dispatcher", &self.dispatcher)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
