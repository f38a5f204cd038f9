//! Command Line Arguments
//!
//! Every flag has an environment fallback so the recorder can run under a
//! supervisor with only a `.env` file.

use clap::Parser;

/// Default feed endpoint.
pub const DEFAULT_ENDPOINT: &str = "wss://ws-feed-public.sandbox.exchange.coinbase.com";

/// Raw command line arguments, validated by
/// [`RecorderConfig::from_args`](super::RecorderConfig::from_args).
#[derive(Debug, Clone, Parser)]
#[command(name = "md-capture", version, about = "Coinbase market data recorder")]
pub struct CliArgs {
    /// Feed websocket endpoint.
    #[arg(short = 'E', long, env = "MDCAPTURE_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Products to subscribe to, comma separated or repeated.
    #[arg(short, long, env = "MDCAPTURE_PRODUCTS", value_delimiter = ',')]
    pub products: Vec<String>,

    /// Subscription type: `trades` or `quotes_trades`.
    #[arg(
        short = 's',
        long = "subscription-type",
        env = "MDCAPTURE_SUBSCRIPTION",
        default_value = "trades"
    )]
    pub subscription_type: String,

    /// Record raw payloads instead of tables.
    #[arg(short, long, env = "MDCAPTURE_RAW")]
    pub raw: bool,

    /// Output directory template; supports `{y}`, `{m}`, `{d}`, `{ymd}`.
    #[arg(short, long, env = "MDCAPTURE_OUTPUT")]
    pub output: Option<String>,

    /// Log committer counters every few seconds.
    #[arg(long, env = "MDCAPTURE_STATUS")]
    pub status: bool,

    /// Add the heartbeat channel to `quotes_trades`.
    #[arg(long, env = "MDCAPTURE_HEARTBEAT")]
    pub heartbeat: bool,

    /// Verify server certificates against webpki roots.
    #[arg(long, env = "MDCAPTURE_STRICT_TLS")]
    pub strict_tls: bool,

    /// Handshake timeout in seconds.
    #[arg(long, env = "MDCAPTURE_HANDSHAKE_TIMEOUT_SECS", default_value_t = 10)]
    pub handshake_timeout_secs: u64,

    /// Reconnect delay added per prior attempt, in milliseconds.
    #[arg(long, env = "MDCAPTURE_BACKOFF_UNIT_MS", default_value_t = 1000)]
    pub backoff_unit_ms: u64,

    /// Upper bound on the reconnect delay, in milliseconds.
    #[arg(long, env = "MDCAPTURE_BACKOFF_MAX_MS")]
    pub backoff_max_ms: Option<u64>,
}
