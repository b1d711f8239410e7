//! Request-scoped cancellation and deadlines.
//!
//! Every call into a filter, cache or store goes through
//! [`RequestContext::run`], so a canceled or timed-out request aborts at
//! the next suspend point and reports [`Canceled`] instead of a backend
//! error.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// The request was aborted before the backend call completed.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum Canceled {
    #[error("request was canceled")]
    Canceled,
    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation signal and optional deadline for one request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context that is never canceled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancels this context and every clone of it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_canceled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fails fast if the context is already canceled or past its deadline.
    pub fn check(&self) -> Result<(), Canceled> {
        if self.token.is_cancelled() {
            return Err(Canceled::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Canceled::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drives `fut` to completion unless the context is canceled or its
    /// deadline passes first, in which case `fut` is dropped.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Canceled>
    where
        F: Future,
    {
        self.check()?;

        let guarded = async {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => Err(Canceled::Canceled),
                output = fut => Ok(output),
            }
        };

        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, guarded)
                .await
                .unwrap_or(Err(Canceled::DeadlineExceeded)),
            None => guarded.await,
        }
    }
}
