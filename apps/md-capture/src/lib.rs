#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::cast_possible_truncation,
        clippy::items_after_statements
    )
)]

//! Market Data Capture - Coinbase Feed Recorder
//!
//! Holds one websocket subscription to the Coinbase Exchange feed and
//! persists every message it understands into per-category CSV tables
//! (or, in raw mode, appends payloads verbatim to a daily log).
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure capture types
//!   - `subscription`: Channels, modes and the validated subscription
//!   - `tables`: Table schemas, rows and receipt-time formatting
//!
//! - **Application**: The recording loop and its ports
//!   - `ports`: Feed transport and clock interfaces
//!   - `services`: Dispatcher, status reporter and recorder loop
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `coinbase`: Websocket connection, codec, TLS, reconnect policy
//!   - `storage`: Committer and output layout
//!   - `config`: Command line and environment configuration
//!   - `telemetry`: Logging and tracing
//!
//! # Data Flow
//!
//! ```text
//! Coinbase WS ──► ConnectionManager ──► MessageDispatcher ──► Committer ──► YYYYMMDD.<table>.csv
//!                                                                   └──► YYYYMMDD.raw.json
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core capture types with no I/O.
pub mod domain;

/// Application layer - Recording loop and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::subscription::{Channel, Subscription, SubscriptionError, SubscriptionMode};
pub use domain::tables::{TableRow, TableSchema, marshal_receipt_time};

// Application
pub use application::ports::{Clock, ConnectionError, FeedTransport, ReadOutcome, SystemClock};
pub use application::services::{
    DispatchError, Disposition, MessageDispatcher, Recorder, RecorderError, RecorderState,
    StatusReporter, StopReason,
};

// Feed adapters
pub use infrastructure::coinbase::{
    BackoffStrategy, CodecError, ConnectionManager, ConnectionSettings, LinearBackoff,
    ReconnectPolicy, TlsVerification,
};

// Storage
pub use infrastructure::storage::{CaptureMode, CommitError, Committer, OutputLayout};

// Configuration
pub use infrastructure::config::{CliArgs, ConfigError, RecorderConfig};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
