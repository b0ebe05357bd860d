//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the wire protocol implementation, the quote
//! cache, configuration loading, and tracing setup.

/// Quote cache (single writer, many readers).
pub mod cache;

/// Configuration loading.
pub mod config;

/// Feed protocol adapters (codec, session machine, connection client).
pub mod fix;

/// Tracing initialization.
pub mod telemetry;
