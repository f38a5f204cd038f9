//! Subscription Types
//!
//! Domain types describing what the recorder asks the venue for: a fixed
//! endpoint, a non-empty list of instruments and a subscription mode that
//! maps to an ordered set of channels.
//!
//! A [`Subscription`] is built once from configuration and never mutated;
//! every reconnect re-sends the same request.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

// =============================================================================
// Channels
// =============================================================================

/// Venue channel identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Ticker updates (last trade plus best bid/ask).
    Ticker,
    /// Individual trade matches.
    Matches,
    /// Level 2 order book snapshot and updates.
    Level2,
    /// Per-product heartbeat.
    Heartbeat,
}

impl Channel {
    /// Get the wire name of the channel.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::Matches => "matches",
            Self::Level2 => "level2",
            Self::Heartbeat => "heartbeat",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Subscription Mode
// =============================================================================

/// What the recorder captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriptionMode {
    /// Ticker channel only.
    #[default]
    Trades,
    /// Ticker, matches and level 2 channels.
    QuotesTrades,
}

impl SubscriptionMode {
    /// Get the configuration name of the mode.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trades => "trades",
            Self::QuotesTrades => "quotes_trades",
        }
    }

    /// Ordered channel set for this mode.
    ///
    /// `with_heartbeat` appends the heartbeat channel to `quotes_trades`;
    /// it has no effect on `trades`.
    #[must_use]
    pub fn channels(&self, with_heartbeat: bool) -> Vec<Channel> {
        match self {
            Self::Trades => vec![Channel::Ticker],
            Self::QuotesTrades => {
                let mut channels = vec![Channel::Ticker, Channel::Matches, Channel::Level2];
                if with_heartbeat {
                    channels.push(Channel::Heartbeat);
                }
                channels
            }
        }
    }
}

impl FromStr for SubscriptionMode {
    type Err = SubscriptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trades" => Ok(Self::Trades),
            "quotes_trades" => Ok(Self::QuotesTrades),
            other => Err(SubscriptionError::UnknownMode(other.to_string())),
        }
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// Validated, immutable subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    product_ids: Vec<String>,
    mode: SubscriptionMode,
    channels: Vec<Channel>,
}

impl Subscription {
    /// Build a subscription.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::EmptyInstruments`] when no instrument
    /// identifiers remain after trimming blanks.
    pub fn new(
        product_ids: impl IntoIterator<Item = String>,
        mode: SubscriptionMode,
        with_heartbeat: bool,
    ) -> Result<Self, SubscriptionError> {
        let product_ids: Vec<String> = product_ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();

        if product_ids.is_empty() {
            return Err(SubscriptionError::EmptyInstruments);
        }

        Ok(Self {
            product_ids,
            mode,
            channels: mode.channels(with_heartbeat),
        })
    }

    /// Instrument identifiers in configuration order.
    #[must_use]
    pub fn product_ids(&self) -> &[String] {
        &self.product_ids
    }

    /// Subscription mode.
    #[must_use]
    pub const fn mode(&self) -> SubscriptionMode {
        self.mode
    }

    /// Channels requested on subscribe.
    #[must_use]
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }
}

/// Subscription validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    /// No instruments were given.
    #[error("instrument list cannot be empty")]
    EmptyInstruments,
    /// Mode name is not one of `trades` or `quotes_trades`.
    #[error("unknown subscription type: {0}")]
    UnknownMode(String),
}
