#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use backoff::backoff::Backoff;

const DEFAULT_CONNECT_TIMEOUT_DURATION: Duration = Duration::from_secs(10);
const DEFAULT_BASE_DELAY_DURATION: Duration = Duration::from_secs(1);
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Configuration for WebSocket client behavior.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum time an opening handshake may take before it counts as a failed attempt
    pub connect_timeout: Duration,
    /// Reconnection strategy configuration
    pub reconnect: ReconnectConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_DURATION,
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Configuration for automatic reconnection behavior.
///
/// The delay before reconnect attempt `n` is `base_delay × n`, so the default
/// schedule waits 1s, 2s, 3s, 4s and 5s before giving up.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of reconnection attempts before giving up.
    /// `None` means infinite retries.
    pub max_attempts: Option<u32>,
    /// Delay before the first reconnection attempt, and the step added for each further one
    pub base_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            base_delay: DEFAULT_BASE_DELAY_DURATION,
        }
    }
}

impl From<ReconnectConfig> for LinearBackoff {
    fn from(config: ReconnectConfig) -> Self {
        Self {
            base_delay: config.base_delay,
            max_attempts: config.max_attempts,
            attempt: 0,
        }
    }
}

/// Linearly increasing reconnect delay with an optional attempt ceiling.
///
/// This is the attempt counter of the connection: [`Backoff::next_backoff`]
/// increments it and returns `None` once the ceiling is reached, and
/// [`Backoff::reset`] zeroes it after a successful open.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    base_delay: Duration,
    max_attempts: Option<u32>,
    attempt: u32,
}

impl LinearBackoff {
    /// Number of reconnect attempts scheduled since the last reset.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Configured ceiling, if any.
    #[must_use]
    pub const fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }
}

impl Backoff for LinearBackoff {
    fn reset(&mut self) {
        self.attempt = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if let Some(max) = self.max_attempts
            && self.attempt >= max
        {
            return None;
        }

        self.attempt = self.attempt.saturating_add(1);
        Some(self.base_delay.saturating_mul(self.attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_is_one_to_five_seconds() {
        let mut backoff: LinearBackoff = ReconnectConfig::default().into();

        let delays: Vec<Duration> = std::iter::from_fn(|| backoff.next_backoff()).collect();

        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(3),
                Duration::from_secs(4),
                Duration::from_secs(5),
            ]
        );
        assert_eq!(backoff.attempt(), 5);
        assert_eq!(backoff.next_backoff(), None);
    }

    #[test]
    fn reset_restarts_at_base_delay() {
        let mut backoff: LinearBackoff = ReconnectConfig::default().into();

        _ = backoff.next_backoff();
        _ = backoff.next_backoff();
        backoff.reset();

        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn unlimited_attempts_never_give_up() {
        let mut backoff: LinearBackoff = ReconnectConfig {
            max_attempts: None,
            base_delay: Duration::from_millis(10),
        }
        .into();

        for _ in 0..100 {
            assert!(backoff.next_backoff().is_some());
        }
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(1010)));
    }

    #[test]
    fn zero_ceiling_gives_up_immediately() {
        let mut backoff: LinearBackoff = ReconnectConfig {
            max_attempts: Some(0),
            base_delay: Duration::from_secs(1),
        }
        .into();

        assert_eq!(backoff.next_backoff(), None);
        assert_eq!(backoff.attempt(), 0);
    }

    #[test]
    fn default_connect_timeout_is_ten_seconds() {
        let config = Config::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.reconnect.max_attempts, Some(5));
    }
}
