//! Domain Layer - Core capture types.
//!
//! Pure types with no I/O: what the recorder subscribes to and the shape
//! of the tables it writes.

/// Channels, subscription modes and the validated subscription.
pub mod subscription;

/// Output table schemas and row types.
pub mod tables;
