#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! FX Feed Client - Market Data Session Client
//!
//! Maintains one persistent, authenticated session to the upstream FX
//! price feed and exposes the latest validated quote per symbol to the
//! rest of the system with bounded staleness. When the feed is down the
//! client keeps retrying forever and consumers observe a degraded mode,
//! never an error.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Quote and symbol types with construction-time validation
//!
//! - **Application**: The consumer-facing surface
//!   - `feed`: `FeedHandle` accessors, `FeedMode`, shared `SessionStatus`
//!
//! - **Infrastructure**: Adapters and integrations
//!   - `fix`: message types, frame codec, session state machine,
//!     reconnect policy, connection supervisor
//!   - `cache`: single-writer/many-reader quote cache
//!   - `config`: env-driven configuration
//!   - `telemetry`: tracing setup
//!
//! # Data Flow
//!
//! ```text
//! wire bytes ──► Codec ──► Session Machine ──► Quote Cache ◄── FeedHandle ◄── web layer
//!                              │                                  reads        (excluded)
//!                              └── session-level replies ──► wire
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Quote types with no runtime dependencies.
pub mod domain;

/// Application layer - The consumer-facing feed surface.
pub mod application;

/// Infrastructure layer - Protocol, cache, config, telemetry.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::quote::{Quote, QuoteError, Symbol};

// Application surface
pub use application::feed::{
    ConnectionState, FeedHandle, FeedMode, FeedSource, SessionStatus,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, FeedConfig, FeedCredentials};

// Feed client (for the binary and integration tests)
pub use infrastructure::cache::QuoteCache;
pub use infrastructure::fix::FeedClient;
