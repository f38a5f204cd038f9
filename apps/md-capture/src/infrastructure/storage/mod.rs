//! Capture Storage
//!
//! Durable output: dated CSV tables and the raw payload log.

pub mod committer;
pub mod layout;

pub use committer::{CaptureMode, CommitError, Committer};
pub use layout::{OutputLayout, expand_directory_template};
