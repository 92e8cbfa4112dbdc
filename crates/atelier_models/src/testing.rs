//! Scriptable adapter for tests.

use crate::adapter::{Credentials, GenerationAdapter, Invocation, PendingHandle, StatusUpdate};
use crate::error::AdapterError;
use crate::model::ModelDefinition;
use crate::request::GenerationRequest;
use crate::result::GenerationResult;
use async_trait::async_trait;
use core::sync::atomic::{AtomicUsize, Ordering};
use core::time::Duration;
use parking_lot::Mutex;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
enum Response {
    Immediate(GenerationResult),
    Pending(PendingHandle),
    Fail(String),
}

/// Adapter with scripted responses and call counters.
///
/// Polls pop scripted updates in order; once one update remains it is
/// returned forever.
///
/// ```ignore
/// use atelier_models::testing::MockAdapter;
/// use atelier_models::{GenerationResult, StatusUpdate};
///
/// let adapter = MockAdapter::pending("tok-1")
///     .with_updates([StatusUpdate::Processing { progress: Some(50) }]);
/// ```
#[derive(Debug)]
pub struct MockAdapter {
    response: Response,
    updates: Mutex<VecDeque<StatusUpdate>>,
    invoke_delay: Duration,
    poll_delay: Duration,
    failing_polls: AtomicUsize,
    cancel_supported: bool,
    invocations: AtomicUsize,
    polls: AtomicUsize,
    cancellations: AtomicUsize,
}

impl MockAdapter {
    fn with_response(response: Response) -> Self {
        Self {
            response,
            updates: Mutex::new(VecDeque::new()),
            invoke_delay: Duration::ZERO,
            poll_delay: Duration::ZERO,
            failing_polls: AtomicUsize::new(0),
            cancel_supported: true,
            invocations: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            cancellations: AtomicUsize::new(0),
        }
    }

    /// Answers every invocation synchronously with `result`.
    #[must_use]
    pub fn immediate(result: GenerationResult) -> Self {
        Self::with_response(Response::Immediate(result))
    }

    /// Answers every invocation with a pending handle.
    #[must_use]
    pub fn pending(token: impl Into<String>) -> Self {
        Self::with_response(Response::Pending(PendingHandle::new(token)))
    }

    /// Fails every invocation.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_response(Response::Fail(message.into()))
    }

    /// Scripts the poll responses.
    #[must_use]
    pub fn with_updates(self, updates: impl IntoIterator<Item = StatusUpdate>) -> Self {
        *self.updates.lock() = updates.into_iter().collect();
        self
    }

    /// Delays every invocation.
    #[must_use]
    pub fn with_invoke_delay(mut self, delay: Duration) -> Self {
        self.invoke_delay = delay;
        self
    }

    /// Delays every poll.
    #[must_use]
    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = delay;
        self
    }

    /// Makes the next `count` polls fail with an HTTP error.
    #[must_use]
    pub fn with_failing_polls(self, count: usize) -> Self {
        self.failing_polls.store(count, Ordering::SeqCst);
        self
    }

    /// Makes `cancel` report itself unsupported.
    #[must_use]
    pub fn without_cancel(mut self) -> Self {
        self.cancel_supported = false;
        self
    }

    /// Number of `invoke` calls so far.
    #[must_use]
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Number of `poll_status` calls so far.
    #[must_use]
    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    /// Number of `cancel` calls so far.
    #[must_use]
    pub fn cancellations(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationAdapter for MockAdapter {
    async fn invoke(
        &self,
        _model: &ModelDefinition,
        _request: &GenerationRequest,
        _credentials: Option<&Credentials>,
    ) -> Result<Invocation, AdapterError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if !self.invoke_delay.is_zero() {
            tokio::time::sleep(self.invoke_delay).await;
        }
        match &self.response {
            Response::Immediate(result) => Ok(Invocation::Immediate(result.clone())),
            Response::Pending(handle) => Ok(Invocation::Pending(handle.clone())),
            Response::Fail(message) => Err(AdapterError::Provider {
                status: Some(500),
                message: message.clone(),
            }),
        }
    }

    async fn poll_status(
        &self,
        _handle: &PendingHandle,
        _credentials: Option<&Credentials>,
    ) -> Result<StatusUpdate, AdapterError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if !self.poll_delay.is_zero() {
            tokio::time::sleep(self.poll_delay).await;
        }
        let failing = self
            .failing_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(AdapterError::Http("connection reset".into()));
        }

        let mut updates = self.updates.lock();
        let update = if updates.len() > 1 {
            updates.pop_front()
        } else {
            updates.front().cloned()
        };
        Ok(update.unwrap_or(StatusUpdate::Processing { progress: None }))
    }

    async fn cancel(
        &self,
        _handle: &PendingHandle,
        _credentials: Option<&Credentials>,
    ) -> Result<(), AdapterError> {
        self.cancellations.fetch_add(1, Ordering::SeqCst);
        if self.cancel_supported {
            Ok(())
        } else {
            Err(AdapterError::Unsupported("cancel"))
        }
    }
}
