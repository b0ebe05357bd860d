//! Configuration Module
//!
//! Configuration loading for the feed client.

mod settings;

pub use settings::{
    ConfigError, EndpointSettings, FeedConfig, FeedCredentials, ReconnectSettings, SessionSettings,
};
