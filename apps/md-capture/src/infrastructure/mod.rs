//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Coinbase websocket feed adapters.
pub mod coinbase;

/// Command line and environment configuration.
pub mod config;

/// CSV tables and raw log persistence.
pub mod storage;

/// Logging and OpenTelemetry tracing integration.
pub mod telemetry;
