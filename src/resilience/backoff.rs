//! Exponential backoff with jitter for reconnection attempts.

use std::time::Duration;
use rand::Rng;

use crate::config::NodeConfig;

/// Delay schedule for repeated connection attempts.
#[derive(Debug, Clone)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    attempt: u32,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms,
            attempt: 0,
        }
    }

    pub fn from_config(config: &NodeConfig) -> Self {
        Self::new(config.reconnect_base_delay_ms, config.reconnect_max_delay_ms)
    }

    /// Number of delays handed out so far.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Delay before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        delay_for(self.attempt, self.base_ms, self.max_ms)
    }
}

/// Base delay doubled per attempt, capped, plus up to 10% jitter.
fn delay_for(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let capped_delay = base_ms.saturating_mul(exponential_base).min(max_ms);

    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}
