//! Recorder Configuration Settings
//!
//! Typed configuration validated from [`CliArgs`].

use std::time::Duration;

use super::cli::CliArgs;
use crate::domain::subscription::{Subscription, SubscriptionError, SubscriptionMode};
use crate::infrastructure::coinbase::{ConnectionSettings, LinearBackoff, TlsVerification};
use crate::infrastructure::storage::CaptureMode;

/// Validated recorder configuration.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Feed websocket endpoint.
    pub endpoint: String,
    /// Products, mode and channels.
    pub subscription: Subscription,
    /// Tables or raw capture.
    pub capture_mode: CaptureMode,
    /// Output directory template, if any.
    pub directory_template: Option<String>,
    /// Periodic status reporting.
    pub status: bool,
    /// Dial settings.
    pub connection: ConnectionSettings,
    /// Reconnect schedule.
    pub backoff: LinearBackoff,
}

impl RecorderConfig {
    /// Validate command line arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the product list is empty, the subscription type
    /// is unknown, or the endpoint is not a `ws://` or `wss://` URL.
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        validate_endpoint(&args.endpoint)?;

        let mode: SubscriptionMode = args.subscription_type.parse()?;
        let subscription = Subscription::new(args.products, mode, args.heartbeat)?;

        let capture_mode = if args.raw {
            CaptureMode::Raw
        } else {
            CaptureMode::Tables
        };

        let tls = if args.strict_tls {
            TlsVerification::Strict
        } else {
            TlsVerification::Relaxed
        };

        let mut backoff = LinearBackoff::new(Duration::from_millis(args.backoff_unit_ms));
        if let Some(max) = args.backoff_max_ms {
            backoff = backoff.with_max(Duration::from_millis(max));
        }

        Ok(Self {
            endpoint: args.endpoint,
            subscription,
            capture_mode,
            directory_template: args.output.filter(|t| !t.trim().is_empty()),
            status: args.status,
            connection: ConnectionSettings {
                handshake_timeout: Duration::from_secs(args.handshake_timeout_secs),
                tls,
            },
            backoff,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Product list or subscription type is invalid.
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
    /// Endpoint is not a websocket URL.
    #[error("endpoint must start with ws:// or wss://, got {0:?}")]
    InvalidEndpoint(String),
}

fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    let lower = endpoint.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("wss://")
        .or_else(|| lower.strip_prefix("ws://"));

    match rest {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(ConfigError::InvalidEndpoint(endpoint.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::domain::subscription::Channel;

    fn config(args: &[&str]) -> Result<RecorderConfig, ConfigError> {
        let mut argv = vec!["md-capture"];
        argv.extend_from_slice(args);
        RecorderConfig::from_args(CliArgs::try_parse_from(argv).unwrap())
    }

    #[test]
    fn minimal_configuration() {
        let config = config(&["-p", "BTC-USD"]).unwrap();

        assert_eq!(config.subscription.product_ids(), ["BTC-USD"]);
        assert_eq!(config.subscription.channels(), [Channel::Ticker]);
        assert_eq!(config.capture_mode, CaptureMode::Tables);
        assert_eq!(config.connection.tls, TlsVerification::Relaxed);
        assert_eq!(config.backoff, LinearBackoff::default());
        assert!(config.directory_template.is_none());
    }

    #[test]
    fn quotes_trades_with_heartbeat() {
        let config = config(&["-p", "BTC-USD", "-s", "quotes_trades", "--heartbeat"]).unwrap();
        assert_eq!(
            config.subscription.channels(),
            [
                Channel::Ticker,
                Channel::Matches,
                Channel::Level2,
                Channel::Heartbeat
            ]
        );
    }

    #[test]
    fn empty_products_rejected() {
        let err = config(&["-p", " , "]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Subscription(SubscriptionError::EmptyInstruments)
        ));
    }

    #[test]
    fn missing_products_rejected() {
        assert!(config(&[]).is_err());
    }

    #[test]
    fn unknown_mode_rejected() {
        let err = config(&["-p", "BTC-USD", "-s", "level3"]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Subscription(SubscriptionError::UnknownMode(_))
        ));
    }

    #[test]
    fn endpoint_scheme_checked() {
        assert!(config(&["-p", "BTC-USD", "-E", "ws://localhost:9000"]).is_ok());
        assert!(matches!(
            config(&["-p", "BTC-USD", "-E", "https://example.com"]),
            Err(ConfigError::InvalidEndpoint(_))
        ));
        assert!(config(&["-p", "BTC-USD", "-E", "wss://"]).is_err());
    }

    #[test]
    fn raw_strict_and_backoff_cap() {
        let config = config(&[
            "-p",
            "BTC-USD",
            "--raw",
            "--strict-tls",
            "--backoff-unit-ms",
            "250",
            "--backoff-max-ms",
            "5000",
            "--handshake-timeout-secs",
            "3",
        ])
        .unwrap();

        assert_eq!(config.capture_mode, CaptureMode::Raw);
        assert_eq!(config.connection.tls, TlsVerification::Strict);
        assert_eq!(config.connection.handshake_timeout, Duration::from_secs(3));
        assert_eq!(
            config.backoff,
            LinearBackoff::new(Duration::from_millis(250)).with_max(Duration::from_secs(5))
        );
    }
}
