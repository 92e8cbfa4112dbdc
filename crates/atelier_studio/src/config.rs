//! Studio settings.

use core::time::Duration;

/// How the studio follows jobs it submitted.
///
/// While a job runs the watcher waits up to `poll_interval` for a status
/// change, then polls the provider once (bounded by `poll_timeout`). It gives
/// up after `watch_timeout`; the job itself keeps running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudioConfig {
    /// Wait between provider polls.
    pub poll_interval: Duration,
    /// Bound on each provider poll.
    pub poll_timeout: Duration,
    /// Total time a watcher follows one job.
    pub watch_timeout: Duration,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            poll_timeout: Duration::from_secs(10),
            watch_timeout: Duration::from_secs(15 * 60),
        }
    }
}

impl StudioConfig {
    /// Sets the wait between provider polls.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the bound on each provider poll.
    #[must_use]
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Sets how long a watcher follows one job.
    #[must_use]
    pub fn with_watch_timeout(mut self, timeout: Duration) -> Self {
        self.watch_timeout = timeout;
        self
    }
}
