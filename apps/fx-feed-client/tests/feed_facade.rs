//! Feed Facade Integration Tests
//!
//! End-to-end behavior of the consumer surface when the feed is absent:
//! a feed that never connects leaves consumers in degraded mode forever,
//! and a mock deployment serves fallbacks without any session at all.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use fx_feed_client::infrastructure::config::{
    EndpointSettings, FeedCredentials, ReconnectSettings, SessionSettings,
};
use fx_feed_client::{
    FeedClient, FeedConfig, FeedHandle, FeedSource, QuoteCache, SessionStatus, Symbol,
};

fn sym(s: &str) -> Symbol {
    Symbol::new(s).unwrap()
}

/// A port that was just bound and released: connecting to it is refused.
async fn dead_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn config(port: u16) -> FeedConfig {
    FeedConfig {
        source: FeedSource::Live,
        endpoint: EndpointSettings {
            host: "127.0.0.1".to_string(),
            port,
        },
        credentials: FeedCredentials::new("user".to_string(), "pass".to_string()),
        session: SessionSettings::default(),
        reconnect: ReconnectSettings {
            delay_initial: Duration::from_millis(20),
            delay_max: Duration::from_millis(100),
            ..ReconnectSettings::default()
        },
        symbols: vec![sym("GBPJPY")],
        staleness_threshold: Duration::from_secs(30),
        fallback_rates: vec![(sym("GBPJPY"), Decimal::new(18500, 2))],
    }
}

#[tokio::test]
async fn feed_that_never_connects_stays_degraded() {
    let port = dead_port().await;
    let config = config(port);

    let cache = Arc::new(QuoteCache::new());
    let status = Arc::new(SessionStatus::new());
    let cancel = CancellationToken::new();
    let handle = FeedHandle::new(
        Arc::clone(&cache),
        Arc::clone(&status),
        config.source,
        config.symbols.clone(),
        config.staleness_threshold,
        config.fallback_rates.clone(),
    );

    let client = FeedClient::new(
        config,
        Arc::clone(&cache),
        Arc::clone(&status),
        cancel.clone(),
    );
    let task = tokio::spawn(client.run());

    // Give it time for several refused attempts.
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(handle.current_price(&sym("GBPJPY")).is_none());
    assert_eq!(handle.mode_label(), "degraded");
    assert!(
        status.reconnect_attempts() >= 1,
        "reconnection was never scheduled"
    );
    assert!(status.last_error().is_some());

    // The accessor that must never fail keeps serving the fallback.
    assert_eq!(handle.reference_rate(&sym("GBPJPY")), Decimal::new(18500, 2));

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("client did not stop on shutdown")
        .unwrap();
}

#[tokio::test]
async fn mock_deployment_serves_fallbacks_without_a_session() {
    let cache = Arc::new(QuoteCache::new());
    let status = Arc::new(SessionStatus::new());
    let handle = FeedHandle::new(
        cache,
        status,
        FeedSource::Mock,
        vec![sym("GBPJPY"), sym("GBPUSD")],
        Duration::from_secs(30),
        vec![
            (sym("GBPJPY"), Decimal::new(18500, 2)),
            (sym("GBPUSD"), Decimal::new(127, 2)),
        ],
    );

    assert_eq!(handle.mode_label(), "mock");
    assert!(handle.current_price(&sym("GBPJPY")).is_none());
    assert_eq!(handle.reference_rate(&sym("GBPJPY")), Decimal::new(18500, 2));
    assert_eq!(handle.reference_rate(&sym("GBPUSD")), Decimal::new(127, 2));
}
