//! Coinbase WebSocket Message Types
//!
//! Wire format types for the Coinbase Exchange websocket feed. Every
//! inbound message is a JSON object carrying a `type` discriminator.
//!
//! # Message Types
//!
//! ## Persisted
//! - `ticker`: last trade with best bid/ask and 24h/30d statistics
//! - `l2update`: level 2 book changes
//! - `snapshot`: full level 2 book on subscribe
//! - `match` / `last_match`: individual trades
//!
//! ## Logged
//! - `heartbeat`, `error`, `subscriptions`
//!
//! # References
//!
//! - [Websocket Channels](https://docs.cdp.coinbase.com/exchange/docs/websocket-channels)

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::subscription::{Channel, Subscription};
use crate::domain::tables::{self, TableRow};

// =============================================================================
// Envelope
// =============================================================================

/// Minimal decode of an inbound message: only its discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Envelope {
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Every discriminator the feed is known to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Ticker update.
    Ticker,
    /// Level 2 change set.
    L2Update,
    /// Level 2 snapshot.
    Snapshot,
    /// Trade match.
    Match,
    /// Most recent match, sent once on subscribe.
    LastMatch,
    /// Heartbeat.
    Heartbeat,
    /// Error response.
    Error,
    /// Subscription acknowledgement.
    Subscriptions,
    /// Product status (status channel).
    Status,
    /// Order received (full channel).
    Received,
    /// Order open on the book (full channel).
    Open,
    /// Order done (full channel).
    Done,
    /// Order change (full channel).
    Change,
    /// Stop order activation (full channel).
    Activate,
}

impl MessageKind {
    /// Parse a wire discriminator.
    #[must_use]
    pub fn from_wire(kind: &str) -> Option<Self> {
        let kind = match kind {
            "ticker" => Self::Ticker,
            "l2update" => Self::L2Update,
            "snapshot" => Self::Snapshot,
            "match" => Self::Match,
            "last_match" => Self::LastMatch,
            "heartbeat" => Self::Heartbeat,
            "error" => Self::Error,
            "subscriptions" => Self::Subscriptions,
            "status" => Self::Status,
            "received" => Self::Received,
            "open" => Self::Open,
            "done" => Self::Done,
            "change" => Self::Change,
            "activate" => Self::Activate,
            _ => return None,
        };
        Some(kind)
    }

    /// Wire discriminator.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::L2Update => "l2update",
            Self::Snapshot => "snapshot",
            Self::Match => "match",
            Self::LastMatch => "last_match",
            Self::Heartbeat => "heartbeat",
            Self::Error => "error",
            Self::Subscriptions => "subscriptions",
            Self::Status => "status",
            Self::Received => "received",
            Self::Open => "open",
            Self::Done => "done",
            Self::Change => "change",
            Self::Activate => "activate",
        }
    }

    /// Whether the recorder decodes this kind in full.
    #[must_use]
    pub const fn is_handled(&self) -> bool {
        matches!(
            self,
            Self::Ticker
                | Self::L2Update
                | Self::Snapshot
                | Self::Match
                | Self::LastMatch
                | Self::Heartbeat
                | Self::Error
                | Self::Subscriptions
        )
    }
}

// =============================================================================
// Inbound Messages
// =============================================================================

/// Fully decoded inbound message, tagged by `type`.
///
/// Absent and `null` fields decode to their defaults; fields of the wrong
/// JSON type fail the decode.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum FeedMessage {
    /// Ticker update.
    #[serde(rename = "ticker")]
    Ticker(TickerMessage),
    /// Level 2 change set.
    #[serde(rename = "l2update")]
    L2Update(Level2Update),
    /// Level 2 snapshot.
    #[serde(rename = "snapshot")]
    Snapshot(Level2Snapshot),
    /// Trade match.
    #[serde(rename = "match")]
    Match(MatchMessage),
    /// Most recent match.
    #[serde(rename = "last_match")]
    LastMatch(MatchMessage),
    /// Heartbeat.
    #[serde(rename = "heartbeat")]
    Heartbeat(HeartbeatMessage),
    /// Error response.
    #[serde(rename = "error")]
    Error(ErrorMessage),
    /// Subscription acknowledgement.
    #[serde(rename = "subscriptions")]
    Subscriptions(SubscriptionsMessage),
}

impl FeedMessage {
    /// Discriminator of this message.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Ticker(_) => MessageKind::Ticker,
            Self::L2Update(_) => MessageKind::L2Update,
            Self::Snapshot(_) => MessageKind::Snapshot,
            Self::Match(_) => MessageKind::Match,
            Self::LastMatch(_) => MessageKind::LastMatch,
            Self::Heartbeat(_) => MessageKind::Heartbeat,
            Self::Error(_) => MessageKind::Error,
            Self::Subscriptions(_) => MessageKind::Subscriptions,
        }
    }
}

/// Reads `null` as the field's default value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Ticker update.
///
/// # Wire Format (JSON)
/// ```json
/// {
///   "type": "ticker",
///   "sequence": 37475248783,
///   "product_id": "ETH-USD",
///   "price": "1285.22",
///   "open_24h": "1310.79",
///   "volume_24h": "245532.79269678",
///   "low_24h": "1280.52",
///   "high_24h": "1313.8",
///   "volume_30d": "9788783.60117027",
///   "best_bid": "1285.04",
///   "best_ask": "1285.27",
///   "side": "buy",
///   "time": "2022-10-19T23:28:22.061769Z",
///   "trade_id": 370843401,
///   "last_size": "11.4396987"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TickerMessage {
    /// Event time.
    #[serde(deserialize_with = "null_as_default")]
    pub time: String,
    /// Instrument identifier.
    #[serde(deserialize_with = "null_as_default")]
    pub product_id: String,
    /// Trade id of the last trade.
    #[serde(deserialize_with = "null_as_default")]
    pub trade_id: i64,
    /// Feed sequence number.
    #[serde(deserialize_with = "null_as_default")]
    pub sequence: i64,
    /// Last trade price.
    #[serde(deserialize_with = "null_as_default")]
    pub price: String,
    /// Taker side of the last trade.
    #[serde(deserialize_with = "null_as_default")]
    pub side: String,
    /// Last trade size.
    #[serde(deserialize_with = "null_as_default")]
    pub last_size: String,
    /// Best bid price.
    #[serde(deserialize_with = "null_as_default")]
    pub best_bid: String,
    /// Best ask price.
    #[serde(deserialize_with = "null_as_default")]
    pub best_ask: String,
    /// Opening price 24h ago.
    #[serde(deserialize_with = "null_as_default")]
    pub open_24h: String,
    /// 24h high.
    #[serde(deserialize_with = "null_as_default")]
    pub high_24h: String,
    /// 24h low.
    #[serde(deserialize_with = "null_as_default")]
    pub low_24h: String,
    /// 24h volume.
    #[serde(deserialize_with = "null_as_default")]
    pub volume_24h: String,
    /// 30 day volume.
    #[serde(deserialize_with = "null_as_default")]
    pub volume_30d: String,
}

impl TickerMessage {
    /// Row for the ticker table.
    #[must_use]
    pub fn to_row(&self, recv_ts: &str) -> TableRow {
        TableRow::new(
            &tables::TICKER,
            vec![
                MessageKind::Ticker.as_str().to_string(),
                recv_ts.to_string(),
                self.time.clone(),
                self.product_id.clone(),
                self.sequence.to_string(),
                self.last_size.clone(),
                self.price.clone(),
                self.side.clone(),
                self.trade_id.to_string(),
                self.best_bid.clone(),
                self.best_ask.clone(),
                self.open_24h.clone(),
                self.low_24h.clone(),
                self.high_24h.clone(),
                self.volume_24h.clone(),
                self.volume_30d.clone(),
            ],
        )
    }
}

/// One `[side, price, size]` change of an `l2update`.
pub type LevelChange = (String, String, String);

/// One `[price, size]` level of a snapshot.
pub type BookLevel = (String, String);

/// Level 2 change set.
///
/// # Wire Format (JSON)
/// ```json
/// {
///   "type": "l2update",
///   "product_id": "BTC-USD",
///   "changes": [["buy", "22356.270000", "0.00000000"]],
///   "time": "2022-08-04T15:25:05.010758Z"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Level2Update {
    /// Event time.
    #[serde(deserialize_with = "null_as_default")]
    pub time: String,
    /// Instrument identifier.
    #[serde(deserialize_with = "null_as_default")]
    pub product_id: String,
    /// Changes in venue order.
    #[serde(deserialize_with = "null_as_default")]
    pub changes: Vec<LevelChange>,
}

impl Level2Update {
    /// Row for the level table built from the first change only.
    ///
    /// Returns `None` when the message carries no changes.
    #[must_use]
    pub fn first_change_row(&self, recv_ts: &str) -> Option<TableRow> {
        let (side, price, size) = self.changes.first()?;
        Some(TableRow::new(
            &tables::LEVEL,
            vec![
                MessageKind::L2Update.as_str().to_string(),
                recv_ts.to_string(),
                self.time.clone(),
                self.product_id.clone(),
                side.clone(),
                price.clone(),
                size.clone(),
            ],
        ))
    }
}

/// Level 2 snapshot.
///
/// # Wire Format (JSON)
/// ```json
/// {
///   "type": "snapshot",
///   "product_id": "BTC-USD",
///   "bids": [["10101.10", "0.45054140"]],
///   "asks": [["10102.55", "0.57753524"]]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Level2Snapshot {
    /// Instrument identifier.
    #[serde(deserialize_with = "null_as_default")]
    pub product_id: String,
    /// Bid levels.
    #[serde(deserialize_with = "null_as_default")]
    pub bids: Vec<BookLevel>,
    /// Ask levels.
    #[serde(deserialize_with = "null_as_default")]
    pub asks: Vec<BookLevel>,
}

impl Level2Snapshot {
    /// Level rows: every bid as `buy`, then every ask as `sell`, in input
    /// order. Snapshots carry no per-level time so that column is blank.
    #[must_use]
    pub fn to_rows(&self, recv_ts: &str) -> Vec<TableRow> {
        let bids = self.bids.iter().map(|level| ("buy", level));
        let asks = self.asks.iter().map(|level| ("sell", level));

        bids.chain(asks)
            .map(|(side, (price, size))| {
                TableRow::new(
                    &tables::LEVEL,
                    vec![
                        MessageKind::Snapshot.as_str().to_string(),
                        recv_ts.to_string(),
                        String::new(),
                        self.product_id.clone(),
                        side.to_string(),
                        price.clone(),
                        size.clone(),
                    ],
                )
            })
            .collect()
    }
}

/// Trade match.
///
/// # Wire Format (JSON)
/// ```json
/// {
///   "type": "match",
///   "trade_id": 10,
///   "sequence": 50,
///   "maker_order_id": "ac928c66-ca53-498f-9c13-a110027a60e8",
///   "taker_order_id": "132fb6ae-456b-4654-b4e0-d681ac05cea1",
///   "time": "2014-11-07T08:19:27.028459Z",
///   "product_id": "BTC-USD",
///   "size": "5.23512",
///   "price": "400.23",
///   "side": "sell"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MatchMessage {
    /// Event time.
    #[serde(deserialize_with = "null_as_default")]
    pub time: String,
    /// Feed sequence number.
    #[serde(deserialize_with = "null_as_default")]
    pub sequence: i64,
    /// Trade id.
    #[serde(deserialize_with = "null_as_default")]
    pub trade_id: i64,
    /// Resting order id.
    #[serde(deserialize_with = "null_as_default")]
    pub maker_order_id: String,
    /// Incoming order id.
    #[serde(deserialize_with = "null_as_default")]
    pub taker_order_id: String,
    /// Maker side.
    #[serde(deserialize_with = "null_as_default")]
    pub side: String,
    /// Trade size.
    #[serde(deserialize_with = "null_as_default")]
    pub size: String,
    /// Trade price.
    #[serde(deserialize_with = "null_as_default")]
    pub price: String,
    /// Instrument identifier.
    #[serde(deserialize_with = "null_as_default")]
    pub product_id: String,
}

impl MatchMessage {
    /// Row for the match table. `kind` is `match` or `last_match`.
    #[must_use]
    pub fn to_row(&self, kind: MessageKind, recv_ts: &str) -> TableRow {
        TableRow::new(
            &tables::MATCH,
            vec![
                kind.as_str().to_string(),
                recv_ts.to_string(),
                self.time.clone(),
                self.product_id.clone(),
                self.trade_id.to_string(),
                self.side.clone(),
                self.size.clone(),
                self.price.clone(),
                self.sequence.to_string(),
                self.maker_order_id.clone(),
                self.taker_order_id.clone(),
            ],
        )
    }
}

/// Heartbeat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HeartbeatMessage {
    /// Event time.
    #[serde(deserialize_with = "null_as_default")]
    pub time: String,
    /// Feed sequence number.
    #[serde(deserialize_with = "null_as_default")]
    pub sequence: i64,
    /// Last trade id seen for the product.
    #[serde(deserialize_with = "null_as_default")]
    pub last_trade_id: i64,
    /// Instrument identifier.
    #[serde(deserialize_with = "null_as_default")]
    pub product_id: String,
}

/// Error response.
///
/// # Wire Format (JSON)
/// ```json
/// {"type": "error", "message": "Failed to subscribe", "reason": "BTC-XYZ is not a valid product"}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ErrorMessage {
    /// Short error message.
    #[serde(deserialize_with = "null_as_default")]
    pub message: String,
    /// Detailed reason.
    #[serde(deserialize_with = "null_as_default")]
    pub reason: String,
}

/// One channel entry of a subscription acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChannelAck {
    /// Channel name.
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    /// Products subscribed on the channel.
    #[serde(deserialize_with = "null_as_default")]
    pub product_ids: Vec<String>,
}

/// Subscription acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SubscriptionsMessage {
    /// Active channels.
    #[serde(deserialize_with = "null_as_default")]
    pub channels: Vec<ChannelAck>,
}

// =============================================================================
// Outbound Messages
// =============================================================================

/// Subscribe request.
///
/// # Wire Format (JSON)
/// ```json
/// {"type":"subscribe","product_ids":["BTC-USD"],"channels":["ticker","matches","level2"]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribeRequest {
    /// Always `subscribe`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Instruments.
    pub product_ids: Vec<String>,
    /// Channels.
    pub channels: Vec<Channel>,
}

impl SubscribeRequest {
    /// Request for `subscription`.
    #[must_use]
    pub fn from_subscription(subscription: &Subscription) -> Self {
        Self {
            kind: "subscribe",
            product_ids: subscription.product_ids().to_vec(),
            channels: subscription.channels().to_vec(),
        }
    }

    /// Serialize to JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::SubscriptionMode;

    #[test]
    fn envelope_reads_only_type() {
        let env: Envelope = serde_json::from_str(r#"{"type":"ticker","price":42}"#).unwrap();
        assert_eq!(env.kind, "ticker");
    }

    #[test]
    fn kind_round_trip_covers_every_variant() {
        for kind in [
            "ticker",
            "l2update",
            "snapshot",
            "match",
            "last_match",
            "heartbeat",
            "error",
            "subscriptions",
            "status",
            "received",
            "open",
            "done",
            "change",
            "activate",
        ] {
            assert_eq!(MessageKind::from_wire(kind).unwrap().as_str(), kind);
        }
        assert!(MessageKind::from_wire("bogus").is_none());
        assert!(!MessageKind::Received.is_handled());
        assert!(MessageKind::LastMatch.is_handled());
    }

    #[test]
    fn deserialize_ticker() {
        let json = r#"{
            "type": "ticker",
            "sequence": 42,
            "product_id": "BTC-USD",
            "price": "100.5",
            "side": "buy",
            "trade_id": 7,
            "last_size": "0.01",
            "time": "2024-03-07T10:00:00.000001Z"
        }"#;
        let msg: FeedMessage = serde_json::from_str(json).unwrap();
        let FeedMessage::Ticker(ticker) = msg else {
            panic!("expected ticker");
        };
        assert_eq!(ticker.sequence, 42);
        assert_eq!(ticker.price, "100.5");
        assert!(ticker.best_bid.is_empty());
    }

    #[test]
    fn ticker_with_numeric_price_fails() {
        let json = r#"{"type":"ticker","price":100.5}"#;
        assert!(serde_json::from_str::<FeedMessage>(json).is_err());
    }

    #[test]
    fn last_match_keeps_its_kind() {
        let json = r#"{"type":"last_match","trade_id":1,"price":"1","size":"2","side":"buy"}"#;
        let msg: FeedMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.kind(), MessageKind::LastMatch);
    }

    #[test]
    fn snapshot_rows_in_input_order() {
        let snapshot = Level2Snapshot {
            product_id: "BTC-USD".to_string(),
            bids: vec![("10".into(), "1".into()), ("9".into(), "2".into())],
            asks: vec![("11".into(), "3".into())],
        };
        let rows = snapshot.to_rows("ts");
        let sides: Vec<_> = rows.iter().map(|r| r.fields[4].as_str()).collect();
        assert_eq!(sides, vec!["buy", "buy", "sell"]);
        assert!(rows.iter().all(|r| r.fields[2].is_empty()));
        assert_eq!(rows[1].fields[5], "9");
    }

    #[test]
    fn l2update_change_arity_is_checked() {
        let json = r#"{"type":"l2update","changes":[["buy","1.0"]]}"#;
        assert!(serde_json::from_str::<FeedMessage>(json).is_err());
    }

    #[test]
    fn subscribe_request_wire_format() {
        let subscription = Subscription::new(
            vec!["BTC-USD".to_string()],
            SubscriptionMode::QuotesTrades,
            false,
        )
        .unwrap();
        let json = SubscribeRequest::from_subscription(&subscription)
            .to_json()
            .unwrap();
        assert_eq!(
            json,
            r#"{"type":"subscribe","product_ids":["BTC-USD"],"channels":["ticker","matches","level2"]}"#
        );
    }
}
