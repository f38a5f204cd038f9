//! Application Ports
//!
//! Interfaces the recorder loop drives. Infrastructure adapters implement
//! them; tests substitute scripted doubles.
//!
//! - **Driven Ports** (Secondary/Outbound): the market data feed
//!   ([`FeedTransport`]) and wall-clock time ([`Clock`]).

mod clock_port;
mod feed_transport_port;

pub use clock_port::{Clock, SystemClock};
pub use feed_transport_port::{ConnectionError, FeedTransport, ReadOutcome};
