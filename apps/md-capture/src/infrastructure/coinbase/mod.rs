//! Coinbase Feed Adapters
//!
//! Websocket client for the Coinbase Exchange market data feed:
//!
//! - **Connection**: dial, subscribe, read frames, close
//! - **Codec**: envelope-first JSON decoding
//! - **Reconnect**: linear backoff schedule
//! - **TLS**: relaxed or strict certificate validation

pub mod codec;
pub mod connection;
pub mod messages;
pub mod reconnect;
pub mod tls;

pub use codec::{CodecError, Decoded, JsonCodec};
pub use connection::{ConnectionManager, ConnectionSettings, DEFAULT_HANDSHAKE_TIMEOUT};
pub use messages::{FeedMessage, MessageKind, SubscribeRequest};
pub use reconnect::{BackoffStrategy, LinearBackoff, ReconnectPolicy};
pub use tls::TlsVerification;
