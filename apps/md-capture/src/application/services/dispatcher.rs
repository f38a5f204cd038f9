//! Message Dispatcher
//!
//! Classifies each inbound text frame and routes it to the committer.
//!
//! | Kind                          | Outcome                              |
//! |-------------------------------|--------------------------------------|
//! | `ticker`                      | one `ticker` row                     |
//! | `l2update`                    | one `level` row (first change only)  |
//! | `snapshot`                    | one `level` row per bid, then ask    |
//! | `match`, `last_match`         | one `match` row                      |
//! | `heartbeat`, `error`, `subscriptions` | logged                       |
//! | other known kinds             | logged as unhandled, dropped         |
//! | unknown kind, bad envelope    | logged, dropped                      |
//!
//! Raw capture bypasses decoding entirely.

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::domain::tables::{self, TableRow, marshal_receipt_time};
use crate::infrastructure::coinbase::{CodecError, Decoded, FeedMessage, JsonCodec, MessageKind};
use crate::infrastructure::storage::{CommitError, Committer};

/// Fatal dispatch failures.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A known message kind failed its schema.
    #[error(transparent)]
    Decode(#[from] CodecError),

    /// The committer could not persist the message.
    #[error(transparent)]
    Commit(#[from] CommitError),
}

/// What happened to one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Rows appended to a table.
    Committed {
        /// Destination table.
        table: &'static str,
        /// Rows written.
        rows: usize,
    },
    /// Appended verbatim to the raw log.
    Raw,
    /// Informational message, logged only.
    Logged,
    /// Not persisted.
    Dropped,
}

/// Routes decoded frames to tables, or raw frames to the raw log.
#[derive(Debug, Clone, Default)]
pub struct MessageDispatcher {
    codec: JsonCodec,
    raw: bool,
}

impl MessageDispatcher {
    /// Dispatcher that decodes into tables.
    #[must_use]
    pub const fn tables() -> Self {
        Self {
            codec: JsonCodec::new(),
            raw: false,
        }
    }

    /// Dispatcher that appends payloads verbatim.
    #[must_use]
    pub const fn raw() -> Self {
        Self {
            codec: JsonCodec::new(),
            raw: true,
        }
    }

    /// Handle one text frame received at `received_at`.
    ///
    /// # Errors
    ///
    /// Returns an error when a known kind fails its schema or the committer
    /// fails. Both are fatal to the recorder.
    pub fn dispatch(
        &self,
        committer: &mut Committer,
        received_at: &DateTime<Local>,
        payload: &[u8],
    ) -> Result<Disposition, DispatchError> {
        if self.raw {
            committer.commit_raw(received_at, payload)?;
            return Ok(Disposition::Raw);
        }

        let decoded = match self.codec.decode(payload) {
            Ok(decoded) => decoded,
            Err(e) if !e.is_fatal() => {
                tracing::warn!(
                    error = %e,
                    payload = %String::from_utf8_lossy(payload),
                    "Dropping malformed message"
                );
                return Ok(Disposition::Dropped);
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    payload = %String::from_utf8_lossy(payload),
                    "Schema mismatch on known message kind"
                );
                return Err(e.into());
            }
        };

        let message = match decoded {
            Decoded::Message(message) => message,
            Decoded::Unhandled(kind) => {
                tracing::info!(kind = kind.as_str(), "Unhandled message kind");
                return Ok(Disposition::Dropped);
            }
            Decoded::Unrecognized(kind) => {
                tracing::warn!(kind = %kind, "Unrecognized message kind");
                return Ok(Disposition::Dropped);
            }
        };

        let recv_ts = marshal_receipt_time(received_at);
        let (table, rows) = match &message {
            FeedMessage::Ticker(ticker) => (tables::TICKER.name, vec![ticker.to_row(&recv_ts)]),
            FeedMessage::L2Update(update) => (
                tables::LEVEL.name,
                update.first_change_row(&recv_ts).into_iter().collect(),
            ),
            FeedMessage::Snapshot(snapshot) => (tables::LEVEL.name, snapshot.to_rows(&recv_ts)),
            FeedMessage::Match(m) => (
                tables::MATCH.name,
                vec![m.to_row(MessageKind::Match, &recv_ts)],
            ),
            FeedMessage::LastMatch(m) => (
                tables::MATCH.name,
                vec![m.to_row(MessageKind::LastMatch, &recv_ts)],
            ),
            FeedMessage::Heartbeat(hb) => {
                tracing::info!(
                    product_id = %hb.product_id,
                    sequence = hb.sequence,
                    last_trade_id = hb.last_trade_id,
                    "Heartbeat"
                );
                return Ok(Disposition::Logged);
            }
            FeedMessage::Error(err) => {
                tracing::error!(message = %err.message, reason = %err.reason, "Feed error");
                return Ok(Disposition::Logged);
            }
            FeedMessage::Subscriptions(ack) => {
                for channel in &ack.channels {
                    tracing::info!(
                        channel = %channel.name,
                        products = ?channel.product_ids,
                        "Subscription acknowledged"
                    );
                }
                return Ok(Disposition::Logged);
            }
        };

        commit_rows(committer, &rows)?;
        Ok(Disposition::Committed {
            table,
            rows: rows.len(),
        })
    }
}

fn commit_rows(committer: &mut Committer, rows: &[TableRow]) -> Result<(), CommitError> {
    for row in rows {
        committer.commit_record(row.table, &row.fields)?;
    }
    Ok(())
}
