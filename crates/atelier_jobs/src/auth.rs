//! Authentication and rate limiting in front of job submission.
//!
//! [`JobTracker::submit_as`](crate::JobTracker::submit_as) asks an
//! [`AuthGate`] before creating a job. Two gates are provided:
//!
//! - [`OpenGate`] - Allows every caller
//! - [`SlidingWindowGate`] - Requires a signed-in user and limits each user
//!   per route with an in-process sliding window

use async_trait::async_trait;
use atelier_core::{Clock, Timestamp};
use core::time::Duration;
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// User id reported by [`OpenGate`] for anonymous callers.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Who is asking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessRequest {
    /// Signed-in user, if any.
    pub user_id: Option<String>,
    /// The user's email, if known.
    pub email: Option<String>,
}

impl AccessRequest {
    /// A caller without a session.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A signed-in user.
    #[must_use]
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            email: None,
        }
    }

    /// Sets the email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Request budget for a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitProfile {
    /// Requests allowed per window.
    pub max_requests: u32,
    /// Window length.
    pub window: Duration,
}

impl RateLimitProfile {
    /// Expensive generation routes: 10 per minute.
    pub const GENERATION: Self = Self::per_minute(10);
    /// Transcription routes: 20 per minute.
    pub const TRANSCRIPTION: Self = Self::per_minute(20);
    /// Chat routes: 60 per minute.
    pub const CHAT: Self = Self::per_minute(60);
    /// Analysis routes: 30 per minute.
    pub const ANALYSIS: Self = Self::per_minute(30);

    /// A profile allowing `max_requests` per minute.
    #[must_use]
    pub const fn per_minute(max_requests: u32) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(60),
        }
    }
}

/// Why a gate refused a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// No acceptable identity.
    Unauthorized {
        /// Human-readable reason.
        message: String,
    },
    /// Too many requests in the current window.
    RateLimited {
        /// When the caller may try again.
        retry_after: Duration,
    },
}

/// Outcome of [`AuthGate::check_and_authorize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    /// The caller may proceed.
    Allowed {
        /// The authenticated user.
        user_id: String,
    },
    /// The caller was refused.
    Rejected(Rejection),
}

/// Authenticates a caller and charges one request against a route's budget.
#[async_trait]
pub trait AuthGate: Send + Sync + 'static {
    /// Decides whether `access` may call `route_key` under `profile`.
    async fn check_and_authorize(
        &self,
        access: &AccessRequest,
        route_key: &str,
        profile: RateLimitProfile,
    ) -> AuthDecision;
}

/// Gate that allows everyone. Anonymous callers are reported as
/// [`ANONYMOUS_USER`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGate;

#[async_trait]
impl AuthGate for OpenGate {
    async fn check_and_authorize(
        &self,
        access: &AccessRequest,
        _route_key: &str,
        _profile: RateLimitProfile,
    ) -> AuthDecision {
        AuthDecision::Allowed {
            user_id: access
                .user_id
                .clone()
                .unwrap_or_else(|| ANONYMOUS_USER.to_string()),
        }
    }
}

/// Recent hits of one user on one route.
#[derive(Debug, Default)]
struct Window {
    span: Duration,
    hits: VecDeque<Timestamp>,
}

/// Gate that requires a user id and enforces a sliding window per user and route.
///
/// Windows with no hits left inside their span are dropped on the next charge.
#[derive(Debug, Default)]
pub struct SlidingWindowGate {
    windows: Mutex<HashMap<(String, String), Window>>,
    clock: Clock,
}

impl SlidingWindowGate {
    /// Creates a gate using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gate using `clock`.
    #[must_use]
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            windows: Mutex::default(),
            clock,
        }
    }

    fn expire(&self, window: &mut Window) {
        while window
            .hits
            .front()
            .is_some_and(|oldest| self.clock.elapsed_since(*oldest) >= window.span)
        {
            window.hits.pop_front();
        }
    }

    fn charge(&self, user_id: &str, route_key: &str, profile: RateLimitProfile) -> Result<(), Duration> {
        let now = self.clock.now();
        let mut windows = self.windows.lock();
        windows.retain(|_, window| {
            self.expire(window);
            !window.hits.is_empty()
        });

        let window = windows
            .entry((user_id.to_string(), route_key.to_string()))
            .or_default();
        window.span = profile.window;
        self.expire(window);

        if window.hits.len() >= profile.max_requests as usize {
            let oldest = window.hits.front().copied().unwrap_or(now);
            let retry_after = profile
                .window
                .saturating_sub(self.clock.elapsed_since(oldest));
            return Err(retry_after);
        }
        window.hits.push_back(now);
        Ok(())
    }
}

#[async_trait]
impl AuthGate for SlidingWindowGate {
    async fn check_and_authorize(
        &self,
        access: &AccessRequest,
        route_key: &str,
        profile: RateLimitProfile,
    ) -> AuthDecision {
        let Some(user_id) = access.user_id.as_deref().filter(|id| !id.is_empty()) else {
            return AuthDecision::Rejected(Rejection::Unauthorized {
                message: "Authentication required. Please sign in to use this endpoint.".into(),
            });
        };

        match self.charge(user_id, route_key, profile) {
            Ok(()) => AuthDecision::Allowed {
                user_id: user_id.to_string(),
            },
            Err(retry_after) => {
                tracing::debug!(user = user_id, route = route_key, ?retry_after, "rate limited");
                AuthDecision::Rejected(Rejection::RateLimited { retry_after })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_core::MockClock;
    use std::sync::Arc;

    #[tokio::test]
    async fn open_gate_allows_anonymous() {
        let decision = OpenGate
            .check_and_authorize(&AccessRequest::anonymous(), "generate/image-gen", RateLimitProfile::GENERATION)
            .await;
        assert_eq!(
            decision,
            AuthDecision::Allowed {
                user_id: ANONYMOUS_USER.into()
            }
        );
    }

    #[tokio::test]
    async fn sliding_window_requires_user() {
        let gate = SlidingWindowGate::new();
        let decision = gate
            .check_and_authorize(&AccessRequest::anonymous(), "chat", RateLimitProfile::CHAT)
            .await;
        assert!(matches!(decision, AuthDecision::Rejected(Rejection::Unauthorized { .. })));
    }

    #[tokio::test]
    async fn sliding_window_limits_and_recovers() {
        let mock = Arc::new(MockClock::starting_now());
        let gate = SlidingWindowGate::with_clock(Clock::with_provider(mock.clone()));
        let alice = AccessRequest::user("alice");
        let profile = RateLimitProfile::per_minute(2);

        for _ in 0..2 {
            let decision = gate.check_and_authorize(&alice, "generate", profile).await;
            assert!(matches!(decision, AuthDecision::Allowed { .. }));
            mock.advance(Duration::from_secs(10));
        }

        let decision = gate.check_and_authorize(&alice, "generate", profile).await;
        assert_eq!(
            decision,
            AuthDecision::Rejected(Rejection::RateLimited {
                retry_after: Duration::from_secs(40)
            })
        );

        // Other routes and users have their own windows.
        let decision = gate.check_and_authorize(&alice, "chat", profile).await;
        assert!(matches!(decision, AuthDecision::Allowed { .. }));
        let decision = gate
            .check_and_authorize(&AccessRequest::user("bob"), "generate", profile)
            .await;
        assert!(matches!(decision, AuthDecision::Allowed { .. }));

        mock.advance(Duration::from_secs(40));
        let decision = gate.check_and_authorize(&alice, "generate", profile).await;
        assert!(matches!(decision, AuthDecision::Allowed { .. }));
    }

    #[tokio::test]
    async fn windows_are_keyed_by_user_and_route_pair() {
        let gate = SlidingWindowGate::new();
        let profile = RateLimitProfile::per_minute(1);

        // "a:b" on route "c" and "a" on route "b:c" must not share a window.
        let first = gate
            .check_and_authorize(&AccessRequest::user("a:b"), "c", profile)
            .await;
        let second = gate
            .check_and_authorize(&AccessRequest::user("a"), "b:c", profile)
            .await;

        assert!(matches!(first, AuthDecision::Allowed { .. }));
        assert!(matches!(second, AuthDecision::Allowed { .. }));
        assert_eq!(gate.windows.lock().len(), 2);
    }

    #[tokio::test]
    async fn idle_windows_are_dropped() {
        let mock = Arc::new(MockClock::starting_now());
        let gate = SlidingWindowGate::with_clock(Clock::with_provider(mock.clone()));
        let profile = RateLimitProfile::per_minute(5);

        for user in ["alice", "bob", "carol"] {
            let decision = gate
                .check_and_authorize(&AccessRequest::user(user), "generate", profile)
                .await;
            assert!(matches!(decision, AuthDecision::Allowed { .. }));
        }
        assert_eq!(gate.windows.lock().len(), 3);

        mock.advance(Duration::from_secs(61));
        let decision = gate
            .check_and_authorize(&AccessRequest::user("dave"), "chat", profile)
            .await;
        assert!(matches!(decision, AuthDecision::Allowed { .. }));

        let windows = gate.windows.lock();
        assert_eq!(windows.len(), 1);
        assert!(windows.contains_key(&("dave".to_string(), "chat".to_string())));
    }

    #[test]
    fn profiles_match_route_budgets() {
        assert_eq!(RateLimitProfile::GENERATION.max_requests, 10);
        assert_eq!(RateLimitProfile::TRANSCRIPTION.max_requests, 20);
        assert_eq!(RateLimitProfile::CHAT.max_requests, 60);
        assert_eq!(RateLimitProfile::ANALYSIS.max_requests, 30);
    }
}
