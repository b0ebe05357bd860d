//! Quote Cache
//!
//! One mutable slot per tracked symbol holding the most recent validated
//! quote. The discipline is exactly "single writer, many readers,
//! last-value-wins, monotonic-timestamp guard": the feed task is the only
//! writer, request handlers only read, and both sides hold the lock just
//! long enough to copy a slot. No queueing, no history.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::domain::quote::{Quote, Symbol};

/// A cached quote plus the local arrival time used for staleness checks.
#[derive(Debug, Clone)]
struct Slot {
    quote: Quote,
    received_at: Instant,
}

/// Last-value cache for validated quotes.
#[derive(Debug, Default)]
pub struct QuoteCache {
    slots: RwLock<HashMap<Symbol, Slot>>,
}

impl QuoteCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a quote iff its timestamp is strictly newer than the slot's.
    ///
    /// Returns `false` when the update was dropped by the monotonicity
    /// guard. Out-of-order delivery (including replays after a resend)
    /// can therefore never regress the visible price.
    pub fn update(&self, quote: Quote) -> bool {
        let mut slots = self.slots.write();
        match slots.get(&quote.symbol) {
            Some(slot) if quote.timestamp <= slot.quote.timestamp => {
                tracing::debug!(
                    symbol = %quote.symbol,
                    incoming = %quote.timestamp,
                    cached = %slot.quote.timestamp,
                    "stale quote dropped"
                );
                false
            }
            _ => {
                slots.insert(
                    quote.symbol.clone(),
                    Slot {
                        quote,
                        received_at: Instant::now(),
                    },
                );
                true
            }
        }
    }

    /// Copy out the latest quote for a symbol, regardless of age.
    #[must_use]
    pub fn read(&self, symbol: &Symbol) -> Option<Quote> {
        self.slots.read().get(symbol).map(|slot| slot.quote.clone())
    }

    /// Copy out the latest quote only if it arrived within `max_age`.
    #[must_use]
    pub fn fresh(&self, symbol: &Symbol, max_age: Duration) -> Option<Quote> {
        self.slots.read().get(symbol).and_then(|slot| {
            if slot.received_at.elapsed() <= max_age {
                Some(slot.quote.clone())
            } else {
                None
            }
        })
    }

    /// Whether a fresh quote exists for the symbol.
    #[must_use]
    pub fn is_fresh(&self, symbol: &Symbol, max_age: Duration) -> bool {
        self.slots
            .read()
            .get(symbol)
            .is_some_and(|slot| slot.received_at.elapsed() <= max_age)
    }

    /// Number of symbols with any cached quote.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Whether the cache holds no quotes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    fn quote(symbol: &str, bid: i64, ask: i64, secs: i64) -> Quote {
        Quote::new(
            Symbol::new(symbol).unwrap(),
            Decimal::new(bid, 2),
            Decimal::new(ask, 2),
            Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn read_returns_latest_quote() {
        let cache = QuoteCache::new();
        assert!(cache.update(quote("GBPJPY", 18950, 18953, 0)));
        assert!(cache.update(quote("GBPJPY", 18960, 18963, 1)));

        let latest = cache.read(&Symbol::new("GBPJPY").unwrap()).unwrap();
        assert_eq!(latest.bid, Decimal::new(18960, 2));
    }

    #[test]
    fn absent_symbol_reads_none() {
        let cache = QuoteCache::new();
        assert!(cache.read(&Symbol::new("GBPUSD").unwrap()).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn stale_update_is_dropped_regardless_of_arrival_order() {
        let cache = QuoteCache::new();
        let newer = quote("GBPJPY", 18960, 18963, 10);
        let older = quote("GBPJPY", 18950, 18953, 5);

        // Newer arrives first; the replayed older quote must not win.
        assert!(cache.update(newer.clone()));
        assert!(!cache.update(older));

        let latest = cache.read(&Symbol::new("GBPJPY").unwrap()).unwrap();
        assert_eq!(latest, newer);
    }

    #[test]
    fn equal_timestamp_does_not_overwrite() {
        let cache = QuoteCache::new();
        assert!(cache.update(quote("GBPJPY", 18950, 18953, 0)));
        assert!(!cache.update(quote("GBPJPY", 18999, 19000, 0)));

        let latest = cache.read(&Symbol::new("GBPJPY").unwrap()).unwrap();
        assert_eq!(latest.bid, Decimal::new(18950, 2));
    }

    #[test]
    fn symbols_are_independent() {
        let cache = QuoteCache::new();
        cache.update(quote("GBPJPY", 18950, 18953, 0));
        cache.update(quote("GBPUSD", 12700, 12702, 0));
        assert_eq!(cache.len(), 2);

        let jpy = cache.read(&Symbol::new("GBPJPY").unwrap()).unwrap();
        let usd = cache.read(&Symbol::new("GBPUSD").unwrap()).unwrap();
        assert_eq!(jpy.bid, Decimal::new(18950, 2));
        assert_eq!(usd.bid, Decimal::new(12700, 2));
    }

    #[test]
    fn fresh_filters_by_arrival_age() {
        let cache = QuoteCache::new();
        cache.update(quote("GBPJPY", 18950, 18953, 0));
        let symbol = Symbol::new("GBPJPY").unwrap();

        assert!(cache.fresh(&symbol, Duration::from_secs(60)).is_some());
        assert!(cache.is_fresh(&symbol, Duration::from_secs(60)));

        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.fresh(&symbol, Duration::from_millis(1)).is_none());
        assert!(!cache.is_fresh(&symbol, Duration::from_millis(1)));
        // The raw read still works; staleness only hides it from `fresh`.
        assert!(cache.read(&symbol).is_some());
    }

    #[test]
    fn concurrent_readers_see_consistent_copies() {
        use std::sync::Arc;

        let cache = Arc::new(QuoteCache::new());
        cache.update(quote("GBPJPY", 18950, 18953, 0));

        let writer = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for i in 1..200 {
                    cache.update(quote("GBPJPY", 18950 + i, 18953 + i, i));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    let symbol = Symbol::new("GBPJPY").unwrap();
                    for _ in 0..500 {
                        let quote = cache.read(&symbol).unwrap();
                        // Copies are internally consistent at all times.
                        assert!(quote.bid <= quote.ask);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
