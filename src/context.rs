//! Per-call request context.
//!
//! Every orchestrator operation receives a [`RequestContext`] instead of
//! reaching for a process-wide logger. It carries the tracing span for the
//! call, an optional deadline and a cancellation token; every store call is
//! driven through [`RequestContext::run`] so a cancelled or expired request
//! drops its in-flight store futures.

use crate::store::StoreError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Span;
use uuid::Uuid;

/// Call-scoped context threaded from the boundary into every store call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    deadline: Option<Instant>,
    cancel: CancellationToken,
    span: Span,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// Create a context with a fresh request id, no deadline and its own token.
    pub fn new() -> Self {
        Self::with_request_id(Uuid::new_v4().to_string())
    }

    /// Create a context for an externally supplied request id.
    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        let span = crate::telemetry::spans::request(&request_id);
        Self {
            request_id,
            deadline: None,
            cancel: CancellationToken::new(),
            span,
        }
    }

    /// Set a deadline `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Use `token` for cancellation (typically a child of the shutdown token).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Derive a context for detached work: same request id and span parent,
    /// but independent cancellation and a new deadline.
    pub fn detached(&self, timeout: Duration) -> Self {
        Self {
            request_id: self.request_id.clone(),
            deadline: Some(Instant::now() + timeout),
            cancel: CancellationToken::new(),
            span: self.span.clone(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context; in-flight and future store calls abort.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive a store call, aborting it on cancellation or deadline.
    ///
    /// `op` names the store call in the resulting error.
    pub async fn run<T, E, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<StoreError>,
    {
        if self.cancel.is_cancelled() {
            return Err(StoreError::Cancelled(op));
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(StoreError::Timeout(op));
        }

        let call = async move { fut.await.map_err(Into::into) };
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.cancel.cancelled() => Err(StoreError::Cancelled(op)),
                res = tokio::time::timeout_at(deadline, call) => {
                    res.unwrap_or(Err(StoreError::Timeout(op)))
                }
            },
            None => tokio::select! {
                _ = self.cancel.cancelled() => Err(StoreError::Cancelled(op)),
                res = call => res,
            },
        }
    }
}
