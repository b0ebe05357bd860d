//! Feed Facade
//!
//! The only surface external collaborators see: synchronous read
//! accessors over the quote cache plus a mode flag. Callers never touch
//! the session, the codec, or the reconnect machinery.
//!
//! - [`FeedHandle::current_price`] returns `None` for missing or stale
//!   quotes; the web layer maps that to its maintenance (503) response.
//! - [`FeedHandle::reference_rate`] always returns a number, falling back
//!   to a configured static rate, because its callers render pages and
//!   can tolerate an indicative value but not an error.
//!
//! All accessors are bounded-time: a cache read is a copy under a narrow
//! lock, never a wait on I/O.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::quote::{Quote, Symbol};
use crate::infrastructure::cache::QuoteCache;

/// Last-resort reference rate when a symbol has neither a fresh quote nor
/// a configured fallback. Parity is the only value that is wrong for
/// every pair equally.
pub const DEFAULT_REFERENCE_RATE: Decimal = Decimal::ONE;

// =============================================================================
// Feed Mode
// =============================================================================

/// Operating source for the feed, fixed by deployment configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedSource {
    /// Connect to the real upstream feed.
    #[default]
    Live,
    /// No upstream session; accessors serve fallbacks only.
    Mock,
}

impl FeedSource {
    /// Parse a source from configuration text.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "MOCK" => Self::Mock,
            _ => Self::Live,
        }
    }

    /// Get the source name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Mock => "mock",
        }
    }
}

/// Derived health of the feed as observed by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    /// Session active and every tracked symbol has a fresh quote.
    Live,
    /// Anything else: not connected yet, mid-reconnect, or stale quotes.
    Degraded,
}

impl FeedMode {
    /// Mode name for logs and the observability label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Degraded => "degraded",
        }
    }
}

// =============================================================================
// Session Status
// =============================================================================

/// Connection state of the one upstream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ConnectionState {
    /// No connection.
    #[default]
    Disconnected = 0,
    /// TCP connect or logon handshake in progress.
    Connecting = 1,
    /// Logon complete, session active.
    Connected = 2,
}

impl ConnectionState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disconnected,
        }
    }
}

/// Shared session status, written by the feed task and read by the
/// facade. Counters are observability-only.
#[derive(Debug, Default)]
pub struct SessionStatus {
    state: AtomicU8,
    reconnect_attempts: AtomicU64,
    messages_received: AtomicU64,
    last_error: parking_lot::RwLock<Option<String>>,
}

impl SessionStatus {
    /// Create a status in the disconnected state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection state. Reaching `Connected` clears the error
    /// and the attempt counter.
    pub fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::SeqCst);
        if state == ConnectionState::Connected {
            self.reconnect_attempts.store(0, Ordering::Relaxed);
            *self.last_error.write() = None;
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Record a failure for observability.
    pub fn set_error(&self, message: String) {
        *self.last_error.write() = Some(message);
    }

    /// Most recent failure message, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Count a scheduled reconnect attempt.
    pub fn increment_reconnect_attempts(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Reconnect attempts since the last successful logon.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Count one inbound message.
    pub fn increment_messages(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Total inbound messages across all sessions.
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Feed Handle
// =============================================================================

/// Consumer-facing facade over the cache and session status.
///
/// Cheap to clone; route handlers hold one each.
#[derive(Debug, Clone)]
pub struct FeedHandle {
    cache: Arc<QuoteCache>,
    status: Arc<SessionStatus>,
    source: FeedSource,
    symbols: Arc<[Symbol]>,
    staleness_threshold: Duration,
    fallback_rates: Arc<[(Symbol, Decimal)]>,
}

impl FeedHandle {
    /// Build the facade.
    #[must_use]
    pub fn new(
        cache: Arc<QuoteCache>,
        status: Arc<SessionStatus>,
        source: FeedSource,
        symbols: Vec<Symbol>,
        staleness_threshold: Duration,
        fallback_rates: Vec<(Symbol, Decimal)>,
    ) -> Self {
        Self {
            cache,
            status,
            source,
            symbols: symbols.into(),
            staleness_threshold,
            fallback_rates: fallback_rates.into(),
        }
    }

    /// Latest quote for `symbol`, or `None` when nothing fresh exists.
    ///
    /// Absence covers both "never received" and "older than the staleness
    /// threshold"; the caller treats either as a maintenance condition.
    #[must_use]
    pub fn current_price(&self, symbol: &Symbol) -> Option<Quote> {
        self.cache.fresh(symbol, self.staleness_threshold)
    }

    /// Indicative rate for `symbol`; never absent, never an error.
    ///
    /// Uses the mid of a fresh quote when one exists, the configured
    /// static fallback otherwise, and [`DEFAULT_REFERENCE_RATE`] as the
    /// last resort for untracked symbols.
    #[must_use]
    pub fn reference_rate(&self, symbol: &Symbol) -> Decimal {
        self.current_price(symbol)
            .map_or_else(|| self.fallback_rate(symbol), |quote| quote.mid())
    }

    /// Current feed mode.
    ///
    /// `Live` requires an active session and a fresh quote for every
    /// tracked symbol; everything else is `Degraded`.
    #[must_use]
    pub fn mode(&self) -> FeedMode {
        let connected = self.status.state() == ConnectionState::Connected;
        let all_fresh = self
            .symbols
            .iter()
            .all(|symbol| self.cache.is_fresh(symbol, self.staleness_threshold));
        if self.source == FeedSource::Live && connected && all_fresh {
            FeedMode::Live
        } else {
            FeedMode::Degraded
        }
    }

    /// Observability label combining deployment source and live mode:
    /// `"mock"`, `"live"`, or `"degraded"`.
    #[must_use]
    pub fn mode_label(&self) -> &'static str {
        match self.source {
            FeedSource::Mock => "mock",
            FeedSource::Live => self.mode().as_str(),
        }
    }

    /// The symbols this deployment tracks.
    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Shared session status (for the supervisor and for diagnostics).
    #[must_use]
    pub fn status(&self) -> &Arc<SessionStatus> {
        &self.status
    }

    fn fallback_rate(&self, symbol: &Symbol) -> Decimal {
        self.fallback_rates
            .iter()
            .find(|(s, _)| s == symbol)
            .map_or(DEFAULT_REFERENCE_RATE, |(_, rate)| *rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s).unwrap()
    }

    fn quote(symbol: &str, bid: i64, ask: i64) -> Quote {
        Quote::new(
            sym(symbol),
            Decimal::new(bid, 2),
            Decimal::new(ask, 2),
            Utc::now(),
        )
        .unwrap()
    }

    fn handle(source: FeedSource, staleness: Duration) -> FeedHandle {
        FeedHandle::new(
            Arc::new(QuoteCache::new()),
            Arc::new(SessionStatus::new()),
            source,
            vec![sym("GBPJPY"), sym("GBPUSD")],
            staleness,
            vec![(sym("GBPJPY"), Decimal::new(18500, 2))],
        )
    }

    #[test]
    fn current_price_is_absent_before_any_quote() {
        let handle = handle(FeedSource::Live, Duration::from_secs(30));
        assert!(handle.current_price(&sym("GBPJPY")).is_none());
        assert_eq!(handle.mode(), FeedMode::Degraded);
        assert_eq!(handle.mode_label(), "degraded");
    }

    #[test]
    fn current_price_returns_fresh_quote() {
        let handle = handle(FeedSource::Live, Duration::from_secs(30));
        handle.cache.update(quote("GBPJPY", 18950, 18953));

        let price = handle.current_price(&sym("GBPJPY")).unwrap();
        assert_eq!(price.bid, Decimal::new(18950, 2));
        assert_eq!(price.ask, Decimal::new(18953, 2));
    }

    #[test]
    fn stale_quote_is_absent() {
        let handle = handle(FeedSource::Live, Duration::from_millis(1));
        handle.cache.update(quote("GBPJPY", 18950, 18953));
        std::thread::sleep(Duration::from_millis(20));
        assert!(handle.current_price(&sym("GBPJPY")).is_none());
    }

    #[test]
    fn reference_rate_prefers_fresh_mid() {
        let handle = handle(FeedSource::Live, Duration::from_secs(30));
        handle.cache.update(quote("GBPJPY", 18950, 18953));
        assert_eq!(
            handle.reference_rate(&sym("GBPJPY")),
            Decimal::new(189515, 3)
        );
    }

    #[test]
    fn reference_rate_falls_back_when_absent() {
        let handle = handle(FeedSource::Live, Duration::from_secs(30));
        assert_eq!(
            handle.reference_rate(&sym("GBPJPY")),
            Decimal::new(18500, 2)
        );
        // Untracked symbol without a configured fallback.
        assert_eq!(handle.reference_rate(&sym("EURUSD")), DEFAULT_REFERENCE_RATE);
    }

    #[test]
    fn mode_requires_connection_and_freshness() {
        let handle = handle(FeedSource::Live, Duration::from_secs(30));
        handle.status.set_state(ConnectionState::Connected);
        // Connected but only one of two symbols has a quote.
        handle.cache.update(quote("GBPJPY", 18950, 18953));
        assert_eq!(handle.mode(), FeedMode::Degraded);

        handle.cache.update(quote("GBPUSD", 12700, 12702));
        assert_eq!(handle.mode(), FeedMode::Live);
        assert_eq!(handle.mode_label(), "live");

        handle.status.set_state(ConnectionState::Disconnected);
        assert_eq!(handle.mode(), FeedMode::Degraded);
    }

    #[test]
    fn mock_source_always_labels_mock() {
        let handle = handle(FeedSource::Mock, Duration::from_secs(30));
        assert_eq!(handle.mode_label(), "mock");
        assert_eq!(handle.mode(), FeedMode::Degraded);
        // Accessors still behave.
        assert_eq!(
            handle.reference_rate(&sym("GBPJPY")),
            Decimal::new(18500, 2)
        );
    }

    #[test]
    fn connected_state_clears_attempts_and_error() {
        let status = SessionStatus::new();
        status.increment_reconnect_attempts();
        status.set_error("connect refused".to_string());
        assert_eq!(status.reconnect_attempts(), 1);

        status.set_state(ConnectionState::Connected);
        assert_eq!(status.reconnect_attempts(), 0);
        assert!(status.last_error().is_none());
    }

    #[test]
    fn feed_source_parsing() {
        assert_eq!(FeedSource::from_str_case_insensitive("mock"), FeedSource::Mock);
        assert_eq!(FeedSource::from_str_case_insensitive("MOCK"), FeedSource::Mock);
        assert_eq!(FeedSource::from_str_case_insensitive("live"), FeedSource::Live);
        assert_eq!(FeedSource::from_str_case_insensitive("anything"), FeedSource::Live);
    }
}
