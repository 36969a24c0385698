//! Reconnect delay schedule.

use std::time::Duration;

use actorcore_config::Config;

/// Parameters of the reconnect schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failure, and after every successful connect.
    pub initial: Duration,
    /// Multiplier applied after each failure.
    pub factor: f64,
    /// Upper bound on the delay.
    pub max: Duration,
}

impl BackoffPolicy {
    /// Reads the schedule from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            initial: config.hub_reconnect_initial(),
            factor: config.hub_reconnect_factor(),
            max: config.hub_reconnect_max(),
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            factor: 2.0,
            max: Duration::from_secs(60),
        }
    }
}

pub(crate) struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
}

impl Backoff {
    pub(crate) fn new(policy: BackoffPolicy) -> Self {
        Self {
            current: policy.initial.min(policy.max),
            policy,
        }
    }

    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let next = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.policy.factor)
            .unwrap_or(self.policy.max);
        self.current = next.min(self.policy.max);
        delay
    }

    pub(crate) fn reset(&mut self) {
        self.current = self.policy.initial.min(self.policy.max);
    }
}
