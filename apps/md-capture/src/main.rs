//! Market Data Capture Binary
//!
//! Records one Coinbase feed subscription to daily CSV tables or a raw log,
//! then exits at the first local date change so a supervisor can start the
//! next day.
//!
//! # Usage
//!
//! ```bash
//! md-capture -p BTC-USD,ETH-USD -s quotes_trades -o 'data/{y}/{m}' --status
//! ```
//!
//! # Environment Variables
//!
//! Every flag has an `MDCAPTURE_*` fallback (see `--help`). Also:
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: md-capture)
//! - `RUST_LOG`: Log filter (default: `md_capture=info`)

use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use md_capture::application::ports::{Clock, SystemClock};
use md_capture::application::services::{MessageDispatcher, Recorder, StatusReporter};
use md_capture::domain::tables;
use md_capture::infrastructure::coinbase::{ConnectionManager, ReconnectPolicy};
use md_capture::infrastructure::config::{CliArgs, RecorderConfig};
use md_capture::infrastructure::storage::{CaptureMode, Committer, OutputLayout};
use md_capture::infrastructure::telemetry;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    load_dotenv();
    let args = CliArgs::parse();

    let _telemetry_guard = match telemetry::init() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("md-capture: {e}");
            return ExitCode::FAILURE;
        }
    };

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls crypto provider already installed");
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "md-capture failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs) -> anyhow::Result<()> {
    let config = RecorderConfig::from_args(args).context("invalid configuration")?;
    log_config(&config);

    let clock = SystemClock;
    let layout = OutputLayout::resolve(config.directory_template.as_deref(), clock.today())
        .context("failed to prepare output directory")?;

    let mut committer = Committer::new(layout, config.capture_mode);
    let dispatcher = match config.capture_mode {
        CaptureMode::Raw => MessageDispatcher::raw(),
        CaptureMode::Tables => {
            for schema in &tables::ALL {
                committer.register_table(schema.name, schema.header);
            }
            MessageDispatcher::tables()
        }
    };

    let transport = ConnectionManager::new(
        config.endpoint.clone(),
        config.subscription.clone(),
        config.connection,
    );

    let mut recorder = Recorder::new(
        transport,
        committer,
        dispatcher,
        ReconnectPolicy::new(config.backoff),
        StatusReporter::new(config.status, Instant::now()),
        clock,
    );

    let reason = recorder.run().await.context("recorder stopped on fatal error")?;
    tracing::info!(reason = ?reason, "md-capture exiting");
    Ok(())
}

/// Log the validated configuration.
fn log_config(config: &RecorderConfig) {
    tracing::info!(
        endpoint = %config.endpoint,
        products = ?config.subscription.product_ids(),
        subscription = config.subscription.mode().as_str(),
        channels = ?config.subscription.channels(),
        raw = matches!(config.capture_mode, CaptureMode::Raw),
        output = config.directory_template.as_deref().unwrap_or("."),
        status = config.status,
        "Configuration loaded"
    );
    tracing::debug!(
        tls = config.connection.tls.as_str(),
        handshake_timeout_secs = config.connection.handshake_timeout.as_secs(),
        backoff = ?config.backoff,
        "Connection settings"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}
