//! Application Layer - Recording loop and port definitions.
//!
//! This layer contains the recorder services and the port interfaces
//! they drive.

/// Port interfaces for external systems (feed transport, clock).
pub mod ports;

/// Application services for dispatch, status and the recorder loop.
pub mod services;
