//! Feed Transport Port (Driven Port)
//!
//! Interface for the single subscribed market data connection.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};

/// Connection setup failures. Never fatal: the recorder retries them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// Handshake did not finish in time.
    #[error("handshake timed out after {timeout:?}")]
    HandshakeTimeout {
        /// Configured limit.
        timeout: Duration,
    },

    /// TLS client configuration could not be built.
    #[error("TLS configuration failed: {0}")]
    Tls(String),

    /// Dial or websocket handshake failed.
    #[error("dial failed: {0}")]
    Dial(String),

    /// Subscribe request could not be encoded.
    #[error("subscribe request encoding failed: {0}")]
    Encode(String),

    /// Subscribe request could not be sent.
    #[error("subscribe failed: {0}")]
    Subscribe(String),
}

/// Result of waiting for the next frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Text frame to dispatch.
    Text {
        /// Local receipt time.
        received_at: DateTime<Local>,
        /// Frame payload.
        payload: String,
    },
    /// Control or binary frame, already handled.
    Control,
    /// Transport failed or closed; the connection handle was cleared.
    Disconnected {
        /// Cause, for logging.
        reason: String,
    },
}

/// A subscribed feed connection.
///
/// The transport owns its connection handle exclusively and replaces it on
/// every successful connect.
#[async_trait]
pub trait FeedTransport: Send {
    /// Dial, handshake and send the subscribe request.
    ///
    /// On error the transport is left disconnected.
    async fn connect_and_subscribe(&mut self) -> Result<(), ConnectionError>;

    /// Whether a connection handle is held.
    fn is_connected(&self) -> bool;

    /// Wait for the next frame.
    async fn read_next(&mut self) -> ReadOutcome;

    /// Close the connection, sending a normal closure when possible.
    async fn close(&mut self);
}
