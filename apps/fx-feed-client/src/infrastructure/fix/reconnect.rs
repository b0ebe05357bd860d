//! Reconnection Policy
//!
//! Exponential backoff with full jitter for session re-establishment.
//! Two cadences exist side by side in the supervisor: a fast one for
//! transient disconnects and a deliberately slower, capped one for logon
//! rejections, since hammering a counterparty with bad credentials helps
//! nobody. Neither cadence has an attempt ceiling; degraded mode is an
//! acceptable steady state, silent permanent disconnection is not.

use std::time::Duration;

use rand::Rng;

/// Configuration for one reconnection cadence.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Ceiling for the computed delay.
    pub max_delay: Duration,
    /// Multiplier applied per attempt (e.g. 2.0 doubles the delay).
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Reconnection policy implementing exponential backoff with full jitter.
///
/// `base_delay` grows deterministically (`initial * multiplier^attempt`,
/// capped); `next_delay` draws uniformly from `0..=base` so simultaneous
/// reconnecting clients do not stampede the counterparty.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    current_delay: Duration,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a new reconnection policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        let initial_delay = config.initial_delay;
        Self {
            config,
            current_delay: initial_delay,
            attempt_count: 0,
        }
    }

    /// The deterministic (pre-jitter) delay the next attempt would use.
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        self.current_delay
    }

    /// Advance to the next attempt and return the jittered delay.
    #[must_use]
    pub fn next_delay(&mut self) -> Duration {
        self.attempt_count += 1;
        let base = self.current_delay;

        #[allow(clippy::cast_precision_loss)]
        let scaled = (base.as_millis() as f64 * self.config.multiplier).round();
        let next_millis = if scaled.is_finite() && scaled > 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                scaled as u128
            }
        } else {
            0
        };
        let capped = next_millis.min(self.config.max_delay.as_millis());
        self.current_delay = Duration::from_millis(u64::try_from(capped).unwrap_or(u64::MAX));

        full_jitter(base)
    }

    /// Reset after a successful logon.
    pub const fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempt_count = 0;
    }

    /// Number of attempts since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }
}

/// Full jitter: uniform over `0..=base`.
fn full_jitter(base: Duration) -> Duration {
    let millis = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    if millis == 0 {
        return Duration::ZERO;
    }
    let mut rng = rand::rng();
    Duration::from_millis(rng.random_range(0..=millis))
}
