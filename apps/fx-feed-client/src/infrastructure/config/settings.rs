//! Feed Client Configuration Settings
//!
//! Configuration types for the feed client, loaded from environment
//! variables. Every tunable has a default; only the endpoint and the
//! credentials are required, and only for a live deployment.

use std::time::Duration;

use rust_decimal::Decimal;

use crate::application::feed::FeedSource;
use crate::domain::quote::Symbol;

/// Feed session credentials.
#[derive(Clone)]
pub struct FeedCredentials {
    username: String,
    password: String,
}

impl FeedCredentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(username: String, password: String) -> Self {
        Self { username, password }
    }

    /// Get the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Get the password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for FeedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Upstream endpoint settings.
#[derive(Debug, Clone)]
pub struct EndpointSettings {
    /// Feed host name or address.
    pub host: String,
    /// Feed TCP port.
    pub port: u16,
}

impl EndpointSettings {
    /// Render as a `host:port` address for connecting.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Session-layer settings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Our session identity (SenderCompID).
    pub sender_comp_id: String,
    /// Counterparty identity (TargetCompID).
    pub target_comp_id: String,
    /// Heartbeat interval negotiated on logon.
    pub heartbeat_interval: Duration,
    /// How long to wait for the logon reply.
    pub logon_timeout: Duration,
    /// How long to wait for the logout acknowledgement.
    pub logout_timeout: Duration,
    /// Request a sequence reset on every logon.
    pub reset_on_logon: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            sender_comp_id: "RATESITE".to_string(),
            target_comp_id: "FXFEED".to_string(),
            heartbeat_interval: Duration::from_secs(30),
            logon_timeout: Duration::from_secs(10),
            logout_timeout: Duration::from_secs(5),
            reset_on_logon: true,
        }
    }
}

/// Reconnection settings for both retry cadences.
#[derive(Debug, Clone)]
pub struct ReconnectSettings {
    /// Initial transient-disconnect delay.
    pub delay_initial: Duration,
    /// Maximum transient-disconnect delay.
    pub delay_max: Duration,
    /// Exponential backoff multiplier (both cadences).
    pub delay_multiplier: f64,
    /// Initial delay after a logon rejection.
    pub logon_retry_initial: Duration,
    /// Maximum delay after a logon rejection.
    pub logon_retry_max: Duration,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            delay_initial: Duration::from_millis(500),
            delay_max: Duration::from_secs(30),
            delay_multiplier: 2.0,
            logon_retry_initial: Duration::from_secs(30),
            logon_retry_max: Duration::from_secs(300),
        }
    }
}

/// Complete feed client configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Deployment source (live upstream or mock).
    pub source: FeedSource,
    /// Upstream endpoint.
    pub endpoint: EndpointSettings,
    /// Logon credentials.
    pub credentials: FeedCredentials,
    /// Session-layer settings.
    pub session: SessionSettings,
    /// Reconnect cadences.
    pub reconnect: ReconnectSettings,
    /// Symbols this deployment tracks.
    pub symbols: Vec<Symbol>,
    /// Maximum quote age before it counts as absent.
    pub staleness_threshold: Duration,
    /// Static reference rates served when no fresh quote exists.
    pub fallback_rates: Vec<(Symbol, Decimal)>,
}

impl FeedConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing for a live
    /// deployment or any value fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let source = std::env::var("FEED_SOURCE")
            .map(|s| FeedSource::from_str_case_insensitive(&s))
            .unwrap_or_default();

        let (host, credentials) = if source == FeedSource::Mock {
            // A mock deployment never opens a connection; placeholders
            // keep the rest of the wiring uniform.
            (
                env_or("FEED_HOST", "localhost"),
                FeedCredentials::new(
                    env_or("FEED_USERNAME", "mock"),
                    env_or("FEED_PASSWORD", "mock"),
                ),
            )
        } else {
            (
                require_env("FEED_HOST")?,
                FeedCredentials::new(
                    require_env("FEED_USERNAME")?,
                    require_env("FEED_PASSWORD")?,
                ),
            )
        };

        let endpoint = EndpointSettings {
            host,
            port: parse_env_u16("FEED_PORT", 9880),
        };

        let session_defaults = SessionSettings::default();
        let session = SessionSettings {
            sender_comp_id: env_or("FEED_SENDER_COMP_ID", &session_defaults.sender_comp_id),
            target_comp_id: env_or("FEED_TARGET_COMP_ID", &session_defaults.target_comp_id),
            heartbeat_interval: parse_env_duration_secs(
                "FEED_HEARTBEAT_INTERVAL_SECS",
                session_defaults.heartbeat_interval,
            ),
            logon_timeout: parse_env_duration_secs(
                "FEED_LOGON_TIMEOUT_SECS",
                session_defaults.logon_timeout,
            ),
            logout_timeout: parse_env_duration_secs(
                "FEED_LOGOUT_TIMEOUT_SECS",
                session_defaults.logout_timeout,
            ),
            reset_on_logon: parse_env_bool("FEED_RESET_ON_LOGON", session_defaults.reset_on_logon),
        };

        let reconnect_defaults = ReconnectSettings::default();
        let reconnect = ReconnectSettings {
            delay_initial: parse_env_duration_millis(
                "FEED_RECONNECT_DELAY_INITIAL_MS",
                reconnect_defaults.delay_initial,
            ),
            delay_max: parse_env_duration_secs(
                "FEED_RECONNECT_DELAY_MAX_SECS",
                reconnect_defaults.delay_max,
            ),
            delay_multiplier: parse_env_f64(
                "FEED_RECONNECT_DELAY_MULTIPLIER",
                reconnect_defaults.delay_multiplier,
            ),
            logon_retry_initial: parse_env_duration_secs(
                "FEED_LOGON_RETRY_DELAY_INITIAL_SECS",
                reconnect_defaults.logon_retry_initial,
            ),
            logon_retry_max: parse_env_duration_secs(
                "FEED_LOGON_RETRY_DELAY_MAX_SECS",
                reconnect_defaults.logon_retry_max,
            ),
        };

        let symbols = parse_symbols(&env_or("FEED_SYMBOLS", "GBPJPY,GBPUSD"))?;
        let fallback_rates =
            parse_fallback_rates(&env_or("FEED_FALLBACK_RATES", "GBPJPY=185.00,GBPUSD=1.27"))?;

        Ok(Self {
            source,
            endpoint,
            credentials,
            session,
            reconnect,
            symbols,
            staleness_threshold: parse_env_duration_secs(
                "FEED_STALENESS_THRESHOLD_SECS",
                Duration::from_secs(30),
            ),
            fallback_rates,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// A value failed to parse.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Environment variable name.
        key: String,
        /// Offending value.
        value: String,
    },
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    let value =
        std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map_or(default, |v| v.to_lowercase() != "false")
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

fn parse_symbols(raw: &str) -> Result<Vec<Symbol>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Symbol::new(s).map_err(|_| ConfigError::InvalidValue {
                key: "FEED_SYMBOLS".to_string(),
                value: s.to_string(),
            })
        })
        .collect()
}

fn parse_fallback_rates(raw: &str) -> Result<Vec<(Symbol, Decimal)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let invalid = || ConfigError::InvalidValue {
                key: "FEED_FALLBACK_RATES".to_string(),
                value: pair.to_string(),
            };
            let (symbol, rate) = pair.split_once('=').ok_or_else(invalid)?;
            let symbol = Symbol::new(symbol.trim()).map_err(|_| invalid())?;
            let rate: Decimal = rate.trim().parse().map_err(|_| invalid())?;
            Ok((symbol, rate))
        })
        .collect()
}
