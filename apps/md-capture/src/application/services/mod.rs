//! Application Services
//!
//! Services that run the recording loop:
//!
//! - `MessageDispatcher`: Classifies frames and routes them to tables
//! - `StatusReporter`: Periodic committer counters
//! - `Recorder`: Connection, rollover and shutdown orchestration

pub mod dispatcher;
pub mod recorder;
pub mod status;

pub use dispatcher::{DispatchError, Disposition, MessageDispatcher};
pub use recorder::{Recorder, RecorderError, RecorderState, StopReason};
pub use status::{STATUS_INTERVAL, StatusReporter};
