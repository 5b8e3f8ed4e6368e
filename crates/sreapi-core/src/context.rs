//! Per-request deadline and cancellation.
//!
//! Each inbound call gets a [`RequestContext`]. Persistence code calls
//! [`RequestContext::check`] before touching the database and between rows,
//! so a request whose caller went away or whose deadline passed stops at the
//! next check instead of running to completion.

use crate::config::ApiConfig;
use crate::error::{InventoryError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cancellation token shared between a request's async side and the
/// blocking task doing its storage work.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new cancellation token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. All clones observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Deadline and cancellation signal carried by one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    deadline: Instant,
    cancel: CancellationToken,
}

impl RequestContext {
    /// Create a context that expires `timeout` from now.
    ///
    /// Timeouts past what `Instant` can represent are capped at
    /// [`ApiConfig::MAX_REQUEST_TIMEOUT`].
    pub fn with_timeout(timeout: Duration) -> Self {
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .unwrap_or(now + ApiConfig::MAX_REQUEST_TIMEOUT);
        Self {
            deadline,
            cancel: CancellationToken::new(),
        }
    }

    /// Create a context with an explicit deadline.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline,
            cancel: CancellationToken::new(),
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline (zero once it has passed).
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Token shared with every clone of this context.
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel this request.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Fail if the request was cancelled or its deadline has passed.
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(InventoryError::Cancelled);
        }
        if Instant::now() >= self.deadline {
            return Err(InventoryError::DeadlineExceeded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_token_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_clone_shares_state() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();

        token1.cancel();

        assert!(token1.is_cancelled());
        assert!(token2.is_cancelled());
    }

    #[test]
    fn test_fresh_context_passes_check() {
        let ctx = RequestContext::with_timeout(Duration::from_secs(30));
        assert!(ctx.check().is_ok());
        assert!(ctx.remaining() > Duration::from_secs(29));
    }

    #[test]
    fn test_unbounded_timeout_does_not_overflow() {
        let ctx = RequestContext::with_timeout(Duration::MAX);
        assert!(ctx.check().is_ok());
        assert!(ctx.remaining() > Duration::from_secs(60 * 60));
    }

    #[test]
    fn test_cancelled_context_fails_check() {
        let ctx = RequestContext::with_timeout(Duration::from_secs(30));
        let clone = ctx.clone();
        clone.cancel();
        assert!(matches!(ctx.check(), Err(InventoryError::Cancelled)));
    }

    #[test]
    fn test_expired_context_fails_check() {
        let ctx = RequestContext::with_deadline(Instant::now() - Duration::from_millis(1));
        assert!(matches!(ctx.check(), Err(InventoryError::DeadlineExceeded)));
        assert_eq!(ctx.remaining(), Duration::ZERO);
    }
}
