//! Feed Codec
//!
//! Two-stage JSON decoding for the Coinbase feed:
//!
//! 1. Decode the [`Envelope`] to read the `type` discriminator.
//! 2. For handled kinds, decode the full [`FeedMessage`].
//!
//! Failures in stage 1 mean the payload is noise and are recoverable.
//! Failures in stage 2 mean the venue schema drifted and are not.

use serde::de::Error as _;

use super::messages::{Envelope, FeedMessage, MessageKind};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Payload is not a JSON object with a string `type`.
    #[error("malformed envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    /// Payload of a handled kind does not match its schema.
    #[error("schema mismatch for {kind} message: {source}")]
    Schema {
        /// Discriminator of the message.
        kind: &'static str,
        /// Underlying decode error.
        source: serde_json::Error,
    },
}

impl CodecError {
    /// Whether the recorder must stop on this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Schema { .. })
    }
}

/// Outcome of decoding one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Handled kind, fully decoded.
    Message(FeedMessage),
    /// Known kind the recorder does not decode.
    Unhandled(MessageKind),
    /// Discriminator outside the known set.
    Unrecognized(String),
}

/// JSON codec for the Coinbase feed.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one text payload.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Envelope`] when the discriminator cannot be read
    /// and [`CodecError::Schema`] when a handled kind fails its full decode.
    pub fn decode(&self, payload: &[u8]) -> Result<Decoded, CodecError> {
        let envelope: Envelope = serde_json::from_slice(payload).map_err(CodecError::Envelope)?;

        let Some(kind) = MessageKind::from_wire(&envelope.kind) else {
            return Ok(Decoded::Unrecognized(envelope.kind));
        };

        if !kind.is_handled() {
            return Ok(Decoded::Unhandled(kind));
        }

        let schema_error = |source| CodecError::Schema {
            kind: kind.as_str(),
            source,
        };

        let message: FeedMessage = serde_json::from_slice(payload).map_err(schema_error)?;

        if let FeedMessage::L2Update(update) = &message
            && update.changes.is_empty()
        {
            return Err(schema_error(serde_json::Error::custom(
                "l2update carries no changes",
            )));
        }

        Ok(Decoded::Message(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(text: &str) -> Result<Decoded, CodecError> {
        JsonCodec::new().decode(text.as_bytes())
    }

    #[test]
    fn malformed_json_is_recoverable() {
        let err = decode("not json").unwrap_err();
        assert!(matches!(err, CodecError::Envelope(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn missing_type_is_recoverable() {
        let err = decode(r#"{"price":"1"}"#).unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn unknown_type_is_reported() {
        assert_eq!(
            decode(r#"{"type":"auction"}"#).unwrap(),
            Decoded::Unrecognized("auction".to_string())
        );
    }

    #[test]
    fn full_channel_kinds_are_not_decoded() {
        // `received` would fail a strict decode; it must not be attempted.
        assert_eq!(
            decode(r#"{"type":"received","size":1.5}"#).unwrap(),
            Decoded::Unhandled(MessageKind::Received)
        );
    }

    #[test]
    fn schema_mismatch_is_fatal() {
        let err = decode(r#"{"type":"ticker","price":100.5}"#).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("ticker"));
    }

    #[test]
    fn null_fields_decode_as_defaults() {
        let Decoded::Message(FeedMessage::Ticker(ticker)) = decode(
            r#"{"type":"ticker","product_id":"BTC-USD","trade_id":null,"price":"1","best_bid":null}"#,
        )
        .unwrap() else {
            panic!("expected ticker");
        };
        assert_eq!(ticker.trade_id, 0);
        assert!(ticker.best_bid.is_empty());
        assert_eq!(ticker.price, "1");
    }

    #[test]
    fn null_fields_on_logged_kinds_decode() {
        let Decoded::Message(FeedMessage::Error(error)) =
            decode(r#"{"type":"error","message":"Failed to subscribe","reason":null}"#).unwrap()
        else {
            panic!("expected error");
        };
        assert_eq!(error.message, "Failed to subscribe");
        assert!(error.reason.is_empty());

        let Decoded::Message(FeedMessage::Subscriptions(ack)) = decode(
            r#"{"type":"subscriptions","channels":[{"name":"ticker","product_ids":null}]}"#,
        )
        .unwrap() else {
            panic!("expected subscriptions");
        };
        assert_eq!(ack.channels[0].name, "ticker");
        assert!(ack.channels[0].product_ids.is_empty());
    }

    #[test]
    fn wrong_typed_field_stays_fatal_next_to_nulls() {
        let err = decode(r#"{"type":"match","trade_id":null,"price":400.23}"#).unwrap_err();
        assert!(matches!(err, CodecError::Schema { kind: "match", .. }));
    }

    #[test]
    fn empty_l2update_is_fatal() {
        let err = decode(r#"{"type":"l2update","product_id":"BTC-USD","changes":[]}"#).unwrap_err();
        assert!(matches!(err, CodecError::Schema { kind: "l2update", .. }));
    }

    #[test]
    fn heartbeat_decodes() {
        let decoded = decode(
            r#"{"type":"heartbeat","sequence":90,"last_trade_id":20,"product_id":"BTC-USD","time":"2014-11-07T08:19:28.464459Z"}"#,
        )
        .unwrap();
        let Decoded::Message(FeedMessage::Heartbeat(hb)) = decoded else {
            panic!("expected heartbeat");
        };
        assert_eq!(hb.last_trade_id, 20);
    }
}
