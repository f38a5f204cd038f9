//! Output Table Schemas
//!
//! Every persisted category is a named table with a fixed, ordered header.
//! Rows are plain text columns; numeric identifiers are rendered as decimal
//! strings so each table keeps a single column type.

use chrono::{DateTime, Local, SecondsFormat};

/// A named table and its ordered header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name, also used in the output file name.
    pub name: &'static str,
    /// Column names in write order.
    pub header: &'static [&'static str],
}

/// Ticker updates.
pub const TICKER: TableSchema = TableSchema {
    name: "ticker",
    header: &[
        "type",
        "recv_ts",
        "time",
        "product_id",
        "sequence",
        "qty",
        "price",
        "side",
        "trade_id",
        "best_bid",
        "best_ask",
        "open_24h",
        "low_24h",
        "high_24h",
        "volume_24h",
        "volume_30d",
    ],
};

/// Level 2 updates and expanded snapshots.
pub const LEVEL: TableSchema = TableSchema {
    name: "level",
    header: &["type", "recv_ts", "time", "product_id", "side", "price", "qty"],
};

/// Trade matches.
pub const MATCH: TableSchema = TableSchema {
    name: "match",
    header: &[
        "type",
        "recv_ts",
        "time",
        "product_id",
        "trade_id",
        "side",
        "qty",
        "price",
        "sequence",
        "maker_id",
        "taker_id",
    ],
};

/// All tables the recorder writes in table mode.
pub const ALL: [TableSchema; 3] = [TICKER, LEVEL, MATCH];

/// One row destined for a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    /// Destination table name.
    pub table: &'static str,
    /// Column values in header order.
    pub fields: Vec<String>,
}

impl TableRow {
    /// Create a row for `schema`.
    #[must_use]
    pub const fn new(schema: &TableSchema, fields: Vec<String>) -> Self {
        Self {
            table: schema.name,
            fields,
        }
    }
}

/// Render a receipt timestamp the way it is persisted.
///
/// RFC 3339 with nanoseconds and the local offset, e.g.
/// `2024-03-07T10:15:30.123456789+01:00`.
#[must_use]
pub fn marshal_receipt_time(ts: &DateTime<Local>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, false)
}
