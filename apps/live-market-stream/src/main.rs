//! Live Market Stream Binary
//!
//! Subscribes to a live quote feed and logs status transitions and
//! formatted quotes.
//!
//! # Usage
//!
//! ```bash
//! LIVE_MARKET_FEED_URL=https://example.com/markets/stream cargo run --bin live-market-stream
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `LIVE_MARKET_FEED_URL`: server-push endpoint
//!
//! ## Optional
//! - `LIVE_MARKET_LOCALE`: locale for rendered prices (default: en-US)
//! - `LIVE_MARKET_RECONNECT_BASE_MS`: first retry delay (default: 1500)
//! - `LIVE_MARKET_RECONNECT_MAX_MS`: retry delay cap (default: 30000)
//! - `LIVE_MARKET_RECONNECT_MULTIPLIER`: backoff growth (default: 2.0)
//! - `LIVE_MARKET_RECONNECT_JITTER`: jitter fraction (default: 0.0)
//! - `LIVE_MARKET_MAX_RECONNECT_ATTEMPTS`: 0 = unlimited (default: 0)
//! - `LIVE_MARKET_IDLE_TIMEOUT_SECS`: 0 disables (default: 45)
//! - `LIVE_MARKET_MAX_FRAME_BYTES`: largest buffered event (default: 1048576)
//! - `LIVE_MARKET_CONNECT_TIMEOUT_SECS`: (default: 10)
//! - `LIVE_MARKET_HEALTH_PORT`: 0 disables (default: 8083)
//! - `OTEL_ENABLED`: export traces over OTLP (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: service name (default: live-market-stream)
//! - `RUST_LOG`: log filter (default: `live_market_stream=info`)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use live_market_stream::infrastructure::health::{HealthServer, HealthServerState};
use live_market_stream::infrastructure::telemetry;
use live_market_stream::{
    FeedSnapshot, LiveQuoteClient, PrometheusReporter, QuoteFormatter, StreamConfig, init_metrics,
};
use tokio::signal;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let _telemetry_guard = telemetry::init().context("failed to initialize telemetry")?;

    tracing::info!("Starting live market stream");

    init_metrics().context("failed to install metrics recorder")?;

    let config = StreamConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let client = LiveQuoteClient::spawn(&config, Arc::new(PrometheusReporter::new()))?;

    let health_task = (config.server.health_port != 0).then(|| {
        let state = Arc::new(HealthServerState::new(
            env!("CARGO_PKG_VERSION").to_string(),
            client.subscribe(),
        ));
        let server = HealthServer::new(config.server.health_port, state, shutdown_token.clone());
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                tracing::error!(error = %e, "Health server failed");
            }
        })
    });

    let logger = tokio::spawn(log_feed(
        client.subscribe(),
        QuoteFormatter::new(&config.locale),
        shutdown_token.clone(),
    ));

    client.start();

    await_shutdown(shutdown_token).await;

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, client.shutdown())
        .await
        .is_err()
    {
        tracing::warn!("Live quote client did not stop in time");
    }
    let _ = logger.await;
    if let Some(task) = health_task {
        let _ = task.await;
    }

    tracing::info!("Live market stream stopped");
    Ok(())
}

/// Log status transitions and every changed quote set.
async fn log_feed(
    mut feed: watch::Receiver<FeedSnapshot>,
    formatter: QuoteFormatter,
    cancel: CancellationToken,
) {
    let mut last = feed.borrow_and_update().clone();

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            changed = feed.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        let current = feed.borrow_and_update().clone();

        if current.status != last.status {
            tracing::info!(
                from = %last.status,
                to = %current.status,
                attempt = current.attempt,
                quotes = current.len(),
                "Feed status changed"
            );
        }

        if current.updated_at != last.updated_at {
            for quote in current.quotes.iter() {
                tracing::info!(
                    symbol = %quote.symbol,
                    asset_class = %quote.asset_class,
                    price = %formatter.format_price(quote),
                    change = %formatter.format_change_percent(quote),
                    currency = %quote.currency,
                    "Quote"
                );
            }
        }

        last = current;
    }
}

/// Load environment from `.env` file if present.
fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Log the parsed configuration.
fn log_config(config: &StreamConfig) {
    tracing::info!(
        feed_url = %config.feed_url,
        locale = %config.locale,
        health_port = config.server.health_port,
        "Configuration loaded"
    );
    tracing::debug!(
        initial_delay_ms =
            u64::try_from(config.reconnect.initial_delay.as_millis()).unwrap_or(u64::MAX),
        max_delay_ms =
            u64::try_from(config.reconnect.max_delay.as_millis()).unwrap_or(u64::MAX),
        max_attempts = config.reconnect.max_attempts,
        idle_timeout_secs = config.transport.idle_timeout.map(|d| d.as_secs()),
        max_frame_bytes = config.transport.max_frame_bytes,
        "Reconnect settings"
    );
}

/// Load .env file from any ancestor directory.
fn load_dotenv_from_ancestors() {
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

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
