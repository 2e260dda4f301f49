//! Reconnection strategies
//!
//! After an unplanned close the client asks its strategy how long to wait
//! before the next connection attempt. A successful open resets the
//! strategy so the next outage starts again from the initial delay.
//!
//! # Built-in Strategies
//!
//! - **ExponentialBackoff**: doubling delays with a ceiling (the default)
//! - **FixedDelay**: constant delay between attempts
//! - **NoReconnect**: never reconnect; selected when auto-reconnect is off
//!
//! # Examples
//!
//! ```rust
//! use legends_client::{ExponentialBackoff, ReconnectionStrategy};
//! use std::time::Duration;
//!
//! let mut backoff = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(4));
//! assert_eq!(backoff.next_delay(), Some(Duration::from_secs(1)));
//! assert_eq!(backoff.next_delay(), Some(Duration::from_secs(2)));
//! assert_eq!(backoff.next_delay(), Some(Duration::from_secs(4)));
//! assert_eq!(backoff.next_delay(), Some(Duration::from_secs(4)));
//! ```

use std::time::Duration;

/// Trait for reconnection strategies
///
/// The strategy keeps its own state between calls. `next_delay` is called
/// once per scheduled attempt; `reset` is called whenever a connection opens.
pub trait ReconnectionStrategy: Send + Sync {
    /// Returns the delay before the next reconnection attempt
    ///
    /// - `Some(duration)`: wait this long, then reconnect
    /// - `None`: give up
    fn next_delay(&mut self) -> Option<Duration>;

    /// Reset the strategy after a successful open
    fn reset(&mut self);

    /// Number of delays handed out since the last reset
    fn attempts(&self) -> u32;
}

/// Exponential backoff strategy
///
/// The delay returned for attempt *n* is `min(initial * 2^n, max)`. The
/// value for the following attempt is computed as soon as a delay is handed
/// out, so the ceiling is reached after `log2(max / initial)` failures and
/// held from then on.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    current_delay: Duration,
    max_attempts: Option<u32>,
    jitter: bool,
    attempt: u32,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff strategy
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            current_delay: initial_delay,
            max_attempts: None,
            jitter: false,
            attempt: 0,
        }
    }

    /// Give up after this many consecutive failed attempts
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Add up to 25% random jitter to each delay
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// The delay that the next call to `next_delay` will return (before jitter)
    pub fn current_delay(&self) -> Duration {
        self.current_delay
    }

    /// Initial delay, restored on reset
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Ceiling for the delay
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}

impl Default for ExponentialBackoff {
    /// 1s doubling up to 15s, unlimited attempts, no jitter
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), Duration::from_millis(15000))
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if self.attempt >= max {
                return None;
            }
        }

        let delay = self.current_delay;

        // Advance before the attempt happens
        let doubled = self.current_delay.checked_mul(2).unwrap_or(self.max_delay);
        self.current_delay = std::cmp::min(doubled, self.max_delay);
        self.attempt += 1;

        if self.jitter {
            use rand::Rng;
            let quarter = u64::try_from(delay.as_millis() / 4).unwrap_or(u64::MAX);
            let jitter_ms = rand::thread_rng().gen_range(0..=quarter);
            return Some(delay.saturating_add(Duration::from_millis(jitter_ms)));
        }

        Some(delay)
    }

    fn reset(&mut self) {
        self.current_delay = self.initial_delay;
        self.attempt = 0;
    }

    fn attempts(&self) -> u32 {
        self.attempt
    }
}

/// Fixed delay reconnection strategy
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<u32>,
    attempt: u32,
}

impl FixedDelay {
    /// Create a new fixed delay strategy
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
            attempt: 0,
        }
    }

    /// Give up after this many consecutive failed attempts
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if self.attempt >= max {
                return None;
            }
        }
        self.attempt += 1;
        Some(self.delay)
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }

    fn attempts(&self) -> u32 {
        self.attempt
    }
}

/// Strategy that never reconnects
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReconnect;

impl ReconnectionStrategy for NoReconnect {
    fn next_delay(&mut self) -> Option<Duration> {
        None
    }

    fn reset(&mut self) {}

    fn attempts(&self) -> u32 {
        0
    }
}
