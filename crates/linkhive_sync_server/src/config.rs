//! Configuration for the event relay.

use std::time::Duration;

/// Configuration for per-connection stream sessions.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// How often the fingerprint poll runs while a stream is open.
    pub poll_interval: Duration,
    /// How often a keepalive comment is emitted.
    pub keepalive_interval: Duration,
}

impl RelayConfig {
    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the keepalive interval.
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            keepalive_interval: Duration::from_secs(25),
        }
    }
}
