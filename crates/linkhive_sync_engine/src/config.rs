//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration for the sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// TTL for the items collection. Short: items change often.
    pub items_ttl: Duration,
    /// TTL for the groups collection. Long: groups change rarely.
    pub groups_ttl: Duration,
    /// Page size for the first progressive page (fast first paint).
    pub initial_page_size: u32,
    /// Page size for subsequent progressive pages.
    pub page_size: u32,
    /// Limit sent on full fetches; the server clamps to its own cap.
    pub full_fetch_limit: u32,
    /// Echo-suppression window after a local mutation.
    pub suppression_window: Duration,
    /// Reconnect backoff for the realtime stream.
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Sets the items TTL.
    pub fn with_items_ttl(mut self, ttl: Duration) -> Self {
        self.items_ttl = ttl;
        self
    }

    /// Sets the groups TTL.
    pub fn with_groups_ttl(mut self, ttl: Duration) -> Self {
        self.groups_ttl = ttl;
        self
    }

    /// Sets the progressive page sizes.
    pub fn with_page_sizes(mut self, initial: u32, subsequent: u32) -> Self {
        self.initial_page_size = initial;
        self.page_size = subsequent;
        self
    }

    /// Sets the suppression window.
    pub fn with_suppression_window(mut self, window: Duration) -> Self {
        self.suppression_window = window;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            items_ttl: Duration::from_secs(60),
            groups_ttl: Duration::from_secs(3600),
            initial_page_size: 20,
            page_size: 100,
            full_fetch_limit: 1000,
            suppression_window: Duration::from_secs(3),
            retry: RetryConfig::default(),
        }
    }
}

/// Configuration for realtime reconnect backoff.
///
/// Delay for attempt `n` is
/// `min(max_delay, base_delay * 2^min(n, cap_exponent))` plus jitter.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Base delay for the first reconnect attempt.
    pub base_delay: Duration,
    /// Hard ceiling on the computed delay (before jitter).
    pub max_delay: Duration,
    /// Exponent cap; keeps `2^n` from overflowing on long outages.
    pub cap_exponent: u32,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Disables jitter, for deterministic tests.
    pub fn without_jitter(mut self) -> Self {
        self.add_jitter = false;
        self
    }

    /// Computes the delay before reconnect attempt `attempt` (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(self.cap_exponent);
        let base = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay);

        if self.add_jitter {
            // Up to 25% jitter on top of the capped delay.
            let jitter = base.as_secs_f64() * 0.25 * subsec_jitter();
            base + Duration::from_secs_f64(jitter)
        } else {
            base
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            cap_exponent: 6,
            add_jitter: true,
        }
    }
}

/// Cheap jitter in `[0, 1)` from the clock's subsecond nanos (no
/// external RNG dependency).
fn subsec_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}
