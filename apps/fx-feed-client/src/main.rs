//! FX Feed Client Binary
//!
//! Starts the feed client and keeps the quote cache warm for the rest of
//! the system.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p fx-feed-client
//! ```
//!
//! # Environment Variables
//!
//! ## Required (live source)
//! - `FEED_HOST`: Feed endpoint host
//! - `FEED_USERNAME`: Logon username
//! - `FEED_PASSWORD`: Logon password
//!
//! ## Optional
//! - `FEED_SOURCE`: LIVE | MOCK (default: LIVE)
//! - `FEED_PORT`: Feed endpoint port (default: 9880)
//! - `FEED_SENDER_COMP_ID` / `FEED_TARGET_COMP_ID`: session identity
//! - `FEED_SYMBOLS`: tracked symbols (default: GBPJPY,GBPUSD)
//! - `FEED_HEARTBEAT_INTERVAL_SECS`: heartbeat interval (default: 30)
//! - `FEED_STALENESS_THRESHOLD_SECS`: quote staleness bound (default: 30)
//! - `FEED_RECONNECT_DELAY_INITIAL_MS` / `FEED_RECONNECT_DELAY_MAX_SECS`:
//!   transient backoff tuning
//! - `FEED_LOGON_RETRY_DELAY_INITIAL_SECS` / `FEED_LOGON_RETRY_DELAY_MAX_SECS`:
//!   credential-failure retry tuning
//! - `FEED_FALLBACK_RATES`: static reference rates (default:
//!   GBPJPY=185.00,GBPUSD=1.27)
//! - `RUST_LOG`: log filter (default: fx_feed_client=info)

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio_util::sync::CancellationToken;

use fx_feed_client::infrastructure::telemetry;
use fx_feed_client::{FeedClient, FeedConfig, FeedHandle, FeedSource, QuoteCache, SessionStatus};

/// How long the feed client gets for its best-effort logout on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Cadence of the periodic status line.
const STATUS_REPORT_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    telemetry::init();

    tracing::info!("Starting FX feed client");

    let config = FeedConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();
    let cache = Arc::new(QuoteCache::new());
    let status = Arc::new(SessionStatus::new());

    let handle = FeedHandle::new(
        Arc::clone(&cache),
        Arc::clone(&status),
        config.source,
        config.symbols.clone(),
        config.staleness_threshold,
        config.fallback_rates.clone(),
    );

    let client_task = if config.source == FeedSource::Mock {
        tracing::warn!("FEED_SOURCE=MOCK, no upstream session will be opened");
        None
    } else {
        let client = FeedClient::new(
            config,
            Arc::clone(&cache),
            Arc::clone(&status),
            shutdown_token.clone(),
        );
        Some(tokio::spawn(client.run()))
    };

    // Periodic status line for operators tailing the logs.
    let reporter_handle = handle.clone();
    let reporter_shutdown = shutdown_token.clone();
    tokio::spawn(async move {
        run_status_reporter(reporter_handle, reporter_shutdown).await;
    });

    tracing::info!("Feed client ready");

    await_shutdown(shutdown_token).await;

    if let Some(task) = client_task
        && tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err()
    {
        tracing::warn!("feed client did not stop within the shutdown grace period");
    }

    tracing::info!("Feed client stopped");
    Ok(())
}

/// Log mode and per-symbol freshness at a slow cadence.
async fn run_status_reporter(handle: FeedHandle, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(STATUS_REPORT_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => return,
            _ = interval.tick() => {
                let fresh: Vec<&str> = handle
                    .symbols()
                    .iter()
                    .filter(|symbol| handle.current_price(symbol).is_some())
                    .map(fx_feed_client::Symbol::as_str)
                    .collect();
                tracing::info!(
                    mode = handle.mode_label(),
                    fresh_symbols = ?fresh,
                    reconnect_attempts = handle.status().reconnect_attempts(),
                    messages = handle.status().messages_received(),
                    "feed status"
                );
            }
        }
    }
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

/// Log the parsed configuration (credentials stay redacted).
fn log_config(config: &FeedConfig) {
    tracing::info!(
        source = config.source.as_str(),
        endpoint = %config.endpoint.address(),
        sender = %config.session.sender_comp_id,
        target = %config.session.target_comp_id,
        symbols = ?config.symbols,
        heartbeat_secs = config.session.heartbeat_interval.as_secs(),
        staleness_secs = config.staleness_threshold.as_secs(),
        "Configuration loaded"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
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
        grace_secs = SHUTDOWN_GRACE.as_secs(),
        "Graceful shutdown started"
    );
}
