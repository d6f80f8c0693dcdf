//! Operation context for storage operations.
//!
//! Every public operation in this crate takes an [`OperationContext`]. It
//! carries the caller's deadline along with the identifiers used for audit
//! and tracing. Cancellation is expressed by dropping the returned future;
//! the deadline bounds how long a unit of work may run before it is aborted.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::error::{StorageResult, TransactionError};

/// Per-call context threaded through every operation.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use clinic_persistence::OperationContext;
///
/// let ctx = OperationContext::new()
///     .with_timeout(Duration::from_secs(5))
///     .with_user_id("user-1")
///     .with_correlation_id("req-42");
///
/// assert!(ctx.deadline().is_some());
/// assert_eq!(ctx.user_id(), Some("user-1"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    /// Point in time after which the operation is abandoned.
    deadline: Option<Instant>,
    /// Optional correlation ID for request tracing.
    correlation_id: Option<String>,
    /// Optional acting user ID for audit purposes.
    user_id: Option<String>,
}

impl OperationContext {
    /// Creates a context with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets a deadline relative to now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Creates a context with the specified correlation ID for tracing.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Creates a context with the specified user ID for auditing.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Returns the deadline, if set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the time left before the deadline. `None` means unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns the correlation ID, if set.
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Returns the user ID, if set.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Runs `work` under this context's deadline.
    ///
    /// When the deadline elapses first, `work` is dropped and a
    /// [`TransactionError::Timeout`] is returned.
    pub async fn bounded<F, T>(&self, work: F) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        let Some(deadline) = self.deadline else {
            return work.await;
        };

        let allowed = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout_at(tokio::time::Instant::from_std(deadline), work).await {
            Ok(result) => result,
            Err(_) => Err(TransactionError::Timeout {
                timeout_ms: allowed.as_millis() as u64,
            }
            .into()),
        }
    }
}
