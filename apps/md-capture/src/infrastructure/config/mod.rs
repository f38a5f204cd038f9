//! Configuration Module
//!
//! Command line and environment configuration for the recorder.

mod cli;
mod settings;

pub use cli::{CliArgs, DEFAULT_ENDPOINT};
pub use settings::{ConfigError, RecorderConfig};
