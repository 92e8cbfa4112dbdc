//! Wall-clock time utilities.
//!
//! Provides [`Clock`], a cheap-to-clone handle over a [`ClockProvider`]. Every
//! timestamp recorded by Atelier (node creation, job transitions, registry
//! refreshes) is read through a `Clock` so tests can freeze and advance time.
//!
//! # Example
//!
//! ```
//! use atelier_core::Clock;
//!
//! let clock = Clock::default();
//! let start = clock.now();
//! assert!(clock.now() >= start);
//! ```

use chrono::{DateTime, Utc};
use core::time::Duration;
use std::sync::Arc;

/// UTC wall-clock timestamp used across Atelier records.
pub type Timestamp = DateTime<Utc>;

/// Trait for providing the current wall-clock time.
///
/// Implement this for custom time providers (e.g., mock clock for testing).
///
/// # Example
///
/// ```
/// use atelier_core::{ClockProvider, Timestamp};
///
/// /// A clock that always returns a fixed timestamp.
/// struct FixedClock(Timestamp);
///
/// impl ClockProvider for FixedClock {
///     fn now(&self) -> Timestamp {
///         self.0
///     }
/// }
/// ```
pub trait ClockProvider: Send + Sync + 'static {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// System clock provider.
#[derive(Debug, Clone, Copy, Default)]
struct SystemClock;

impl ClockProvider for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Time provider handle.
///
/// Uses the system clock by default, but can be built over a mock provider for
/// testing. Cloning shares the underlying provider.
#[derive(Clone)]
pub struct Clock {
    provider: Arc<dyn ClockProvider>,
}

impl Clock {
    /// Creates a clock using the system time.
    #[must_use]
    pub fn system() -> Self {
        Self {
            provider: Arc::new(SystemClock),
        }
    }

    /// Creates a clock with a custom provider.
    #[must_use]
    pub fn with_provider(provider: Arc<dyn ClockProvider>) -> Self {
        Self { provider }
    }

    /// Returns the current time.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.provider.now()
    }

    /// Returns the duration elapsed since the given timestamp.
    ///
    /// Timestamps in the future yield [`Duration::ZERO`].
    #[must_use]
    pub fn elapsed_since(&self, earlier: Timestamp) -> Duration {
        (self.now() - earlier).to_std().unwrap_or(Duration::ZERO)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}

impl core::fmt::Debug for Clock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Clock").field("now", &self.now()).finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MockClock for Testing
// ─────────────────────────────────────────────────────────────────────────────

/// Mock clock for testing with controllable time.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use std::time::Duration;
/// use atelier_core::{Clock, MockClock};
///
/// let mock = Arc::new(MockClock::starting_now());
/// let clock = Clock::with_provider(mock.clone());
///
/// let before = clock.now();
/// mock.advance(Duration::from_secs(60));
/// assert_eq!(clock.elapsed_since(before), Duration::from_secs(60));
/// ```
#[cfg(any(test, feature = "test-utils"))]
pub struct MockClock {
    current: parking_lot::RwLock<Timestamp>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockClock {
    /// Creates a mock clock set to the given time.
    #[must_use]
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: parking_lot::RwLock::new(start),
        }
    }

    /// Creates a mock clock set to the current system time.
    #[must_use]
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// Advances the clock by the given duration.
    ///
    /// # Panics
    ///
    /// Panics if the duration does not fit in a `chrono::Duration`.
    pub fn advance(&self, duration: Duration) {
        let delta = chrono::Duration::from_std(duration).expect("duration out of range");
        *self.current.write() += delta;
    }

    /// Sets the clock to a specific time.
    pub fn set(&self, timestamp: Timestamp) {
        *self.current.write() = timestamp;
    }

    /// Returns the current time.
    #[must_use]
    pub fn current(&self) -> Timestamp {
        *self.current.read()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl ClockProvider for MockClock {
    fn now(&self) -> Timestamp {
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_default_uses_system_time() {
        let clock = Clock::default();
        let before = Utc::now();
        let clock_now = clock.now();
        let after = Utc::now();

        assert!(clock_now >= before);
        assert!(clock_now <= after);
    }

    #[test]
    fn elapsed_since_future_is_zero() {
        let clock = Clock::default();
        let future = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(clock.elapsed_since(future), Duration::ZERO);
    }

    #[test]
    fn mock_clock_advance() {
        let mock = MockClock::starting_now();
        let initial = mock.current();

        mock.advance(Duration::from_secs(60));

        let after = mock.current();
        assert_eq!((after - initial).num_seconds(), 60);
    }

    #[test]
    fn clock_with_mock_provider() {
        let mock = Arc::new(MockClock::starting_now());
        let clock = Clock::with_provider(mock.clone());
        let before = clock.now();

        mock.advance(Duration::from_millis(1500));

        assert_eq!(clock.elapsed_since(before), Duration::from_millis(1500));
    }
}
