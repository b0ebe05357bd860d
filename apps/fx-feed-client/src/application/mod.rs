//! Application Layer - The consumer-facing feed surface.
//!
//! The rest of the system (route handlers in the excluded web layer)
//! interacts with the feed only through this layer.

/// Feed facade, mode derivation, and shared session status.
pub mod feed;
