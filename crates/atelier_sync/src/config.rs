//! Scheduling parameters for the [`SyncScheduler`](crate::SyncScheduler).

use core::time::Duration;
use rand::Rng;

/// Timing of synchronization rounds.
///
/// The gap between rounds is drawn uniformly from `interval..=max_interval`
/// so that many processes started together do not hit the catalog sources at
/// the same moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Delay before the first round.
    pub initial_delay: Duration,
    /// Shortest gap between rounds.
    pub interval: Duration,
    /// Longest gap between rounds.
    pub max_interval: Duration,
    /// Pause before retrying a failed source.
    pub retry_delay: Duration,
    /// Retries per source per round after the first failure.
    pub max_retries: u32,
    /// Processing jobs not updated for this long are polled.
    pub stale_after: Duration,
    /// Bound on each stale-job poll.
    pub poll_timeout: Duration,
}

const HOUR: Duration = Duration::from_secs(60 * 60);

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            interval: 3 * HOUR,
            max_interval: 4 * HOUR,
            retry_delay: Duration::from_secs(60),
            max_retries: 3,
            stale_after: Duration::from_secs(30),
            poll_timeout: Duration::from_secs(10),
        }
    }
}

impl SyncConfig {
    /// Sets the delay before the first round.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets a fixed gap between rounds.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self.max_interval = interval;
        self
    }

    /// Sets a jittered gap between rounds.
    #[must_use]
    pub fn with_interval_range(mut self, min: Duration, max: Duration) -> Self {
        self.interval = min;
        self.max_interval = max.max(min);
        self
    }

    /// Sets the pause before retrying a failed source.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sets the retries per source per round.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the staleness threshold for processing jobs.
    #[must_use]
    pub fn with_stale_after(mut self, threshold: Duration) -> Self {
        self.stale_after = threshold;
        self
    }

    /// Sets the bound on each stale-job poll.
    #[must_use]
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Draws the gap before the next round.
    #[must_use]
    pub fn next_interval(&self) -> Duration {
        if self.max_interval <= self.interval {
            return self.interval;
        }
        let min = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(self.max_interval.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(2));
        assert_eq!(config.interval, Duration::from_secs(3 * 3600));
        assert_eq!(config.retry_delay, Duration::from_secs(60));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.stale_after, Duration::from_secs(30));
        assert_eq!(config.poll_timeout, Duration::from_secs(10));
    }

    #[test]
    fn next_interval_stays_in_range() {
        let config = SyncConfig::default();
        for _ in 0..100 {
            let next = config.next_interval();
            assert!(next >= config.interval && next <= config.max_interval);
        }
        let fixed = config.with_interval(Duration::from_secs(5));
        assert_eq!(fixed.next_interval(), Duration::from_secs(5));
    }
}
