//! Quote Types
//!
//! Canonical internal representation of a two-sided FX quote.
//! These types are codec-agnostic: the wire protocol produces them,
//! the cache stores them, and readers receive copies.
//!
//! # Invariants
//!
//! - A [`Quote`] can only be constructed with `bid <= ask`.
//! - Per-symbol timestamp monotonicity is enforced by the cache, not here,
//!   so a replayed message can never regress application state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Errors
// =============================================================================

/// Validation errors for quote domain types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuoteError {
    /// Symbol failed validation.
    #[error("invalid symbol {0:?}: expected 3-12 uppercase ASCII alphanumerics")]
    InvalidSymbol(String),

    /// Bid was above ask.
    #[error("crossed quote for {symbol}: bid {bid} > ask {ask}")]
    Crossed {
        /// Instrument the quote was for.
        symbol: String,
        /// Offending bid price.
        bid: Decimal,
        /// Offending ask price.
        ask: Decimal,
    },
}

// =============================================================================
// Symbol
// =============================================================================

/// A validated instrument identifier (e.g. `GBPJPY`).
///
/// Symbols are uppercase ASCII alphanumerics, 3 to 12 characters.
/// The newtype keeps raw wire strings from leaking into cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Create a symbol, validating the character set and length.
    ///
    /// # Errors
    ///
    /// Returns [`QuoteError::InvalidSymbol`] if the input is not 3-12
    /// uppercase ASCII alphanumeric characters.
    pub fn new(s: impl Into<String>) -> Result<Self, QuoteError> {
        let s = s.into();
        let valid = (3..=12).contains(&s.len())
            && s.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
        if valid {
            Ok(Self(s))
        } else {
            Err(QuoteError::InvalidSymbol(s))
        }
    }

    /// View the symbol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Symbol {
    type Err = QuoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = QuoteError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Quote
// =============================================================================

/// The most recent two-sided price for a single instrument.
///
/// Construction enforces `bid <= ask`; crossed quotes never become values
/// of this type. The `timestamp` is the originating (upstream) time, used
/// by the cache for its monotonicity guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Instrument identifier.
    pub symbol: Symbol,
    /// Bid (buy side) price.
    pub bid: Decimal,
    /// Ask (sell side) price.
    pub ask: Decimal,
    /// Originating timestamp from the feed.
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// Create a quote, rejecting crossed prices.
    ///
    /// # Errors
    ///
    /// Returns [`QuoteError::Crossed`] if `bid > ask`.
    pub fn new(
        symbol: Symbol,
        bid: Decimal,
        ask: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, QuoteError> {
        if bid > ask {
            return Err(QuoteError::Crossed {
                symbol: symbol.as_str().to_string(),
                bid,
                ask,
            });
        }
        Ok(Self {
            symbol,
            bid,
            ask,
            timestamp,
        })
    }

    /// Mid price ((bid + ask) / 2).
    #[must_use]
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }

    /// Spread (ask - bid).
    #[must_use]
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }
}
