//! Polling backoff for `wait_until_done`
//!
//! The delay between status fetches starts small so that short operations are
//! noticed promptly, then grows geometrically up to a ceiling so that long
//! operations do not hammer the server. There is no jitter: polling is not a
//! retry after failure, and every handle polls its own operation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ConfigError;

/// Shortest delay a wait loop ever sleeps between refreshes
pub const MIN_DELAY: Duration = Duration::from_millis(1);

/// Truncated exponential backoff between polling attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Delay after the first unfinished refresh, in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Growth factor applied to the delay after each unfinished refresh
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Ceiling for the delay, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl BackoffPolicy {
    /// Durations are stored in whole milliseconds, rounded up
    pub fn new(initial_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self {
            initial_delay_ms: duration_to_ms(initial_delay),
            multiplier,
            max_delay_ms: duration_to_ms(max_delay),
        }
    }

    /// Same delay on every iteration
    pub fn fixed(delay: Duration) -> Self {
        Self::new(delay, 1.0, delay)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Check the parameters describe a non-shrinking, bounded sequence
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_delay_ms == 0 {
            return Err(ConfigError::InvalidBackoff(
                "initial_delay_ms must be greater than zero".to_string(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::InvalidBackoff(format!(
                "multiplier must be a finite number >= 1.0, got {}",
                self.multiplier
            )));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ConfigError::InvalidBackoff(format!(
                "max_delay_ms ({}) is smaller than initial_delay_ms ({})",
                self.max_delay_ms, self.initial_delay_ms
            )));
        }
        Ok(())
    }

    /// Infinite sequence of delays this policy produces
    ///
    /// Policies that fail [`validate`](Self::validate) are still usable: every
    /// delay is at least [`MIN_DELAY`], a shrinking or NaN multiplier counts as
    /// 1.0, and a ceiling below the initial delay is raised to it.
    pub fn delays(&self) -> Delays {
        let initial = self.initial_delay().max(MIN_DELAY);
        let multiplier = if self.multiplier >= 1.0 {
            self.multiplier
        } else {
            1.0
        };
        Delays {
            next: initial,
            multiplier,
            max: self.max_delay().max(initial),
        }
    }
}

/// Iterator over the delays of a [`BackoffPolicy`]; never ends
#[derive(Debug, Clone)]
pub struct Delays {
    next: Duration,
    multiplier: f64,
    max: Duration,
}

impl Iterator for Delays {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        // Out-of-range products (overflow, NaN) saturate at the ceiling.
        let scaled = (current.as_nanos() as f64 * self.multiplier).round();
        self.next = if scaled.is_finite() && scaled < self.max.as_nanos() as f64 {
            Duration::from_nanos(scaled as u64)
        } else {
            self.max
        };
        Some(current)
    }
}

fn duration_to_ms(d: Duration) -> u64 {
    let ms = d.as_nanos().div_ceil(1_000_000);
    u64::try_from(ms).unwrap_or(u64::MAX)
}

// Default value functions for serde
fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_multiplier() -> f64 {
    1.5
}

fn default_max_delay_ms() -> u64 {
    20_000
}
