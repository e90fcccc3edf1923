//! Cancellation and deadlines for fetches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

/// Why a fetch context is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ContextError {
    #[error("context cancelled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Cancels every [`FetchContext`] derived from the same [`FetchContext::new`] call.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
    notify: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Cancel the associated contexts.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let _ = self.notify.send(true);
    }

    /// Check if cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Caller-supplied cancellation and deadline for a fetch.
///
/// Cheap to clone; clones observe the same cancellation. Dropping every
/// [`CancelHandle`] does not cancel the context.
#[derive(Debug, Clone)]
pub struct FetchContext {
    cancelled: Arc<AtomicBool>,
    notify: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

impl FetchContext {
    /// Create a cancellable context without a deadline.
    pub fn new() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let cancelled = Arc::new(AtomicBool::new(false));

        let ctx = Self {
            cancelled: cancelled.clone(),
            notify: rx,
            deadline: None,
        };

        let handle = CancelHandle {
            cancelled,
            notify: Arc::new(tx),
        };

        (ctx, handle)
    }

    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::new().0
    }

    /// Bound the context by `timeout` from now. An earlier deadline is kept.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.with_deadline(deadline)
    }

    /// Bound the context by `deadline`. An earlier deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why the context is done, or `None` while it is live.
    pub fn err(&self) -> Option<ContextError> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Check if the context is done.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Wait until the context is done.
    pub async fn done(&self) -> ContextError {
        let mut notify = self.notify.clone();
        let cancelled = async {
            loop {
                if self.cancelled.load(Ordering::SeqCst) || *notify.borrow_and_update() {
                    return;
                }
                if notify.changed().await.is_err() && !self.cancelled.load(Ordering::SeqCst) {
                    // No handle left to cancel us.
                    std::future::pending::<()>().await;
                }
            }
        };

        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = cancelled => ContextError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
            },
            None => {
                cancelled.await;
                ContextError::Cancelled
            }
        }
    }
}

impl Default for FetchContext {
    fn default() -> Self {
        Self::background()
    }
}
