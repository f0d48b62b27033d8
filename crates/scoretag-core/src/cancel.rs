//! Cooperative cancellation for analysis batches.
//!
//! The batch runner checks the token before hashing each asset, and the
//! pipeline checks it again before the cache lookup. Assets already past
//! that point are never interrupted, so a cancelled batch cannot leave a
//! half-committed record behind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cancellation token shared between a batch and whoever may abandon it.
///
/// Cloning shares state: cancelling any clone is observed by all of them.
///
/// # Example
///
/// ```
/// use scoretag_core::cancel::CancellationToken;
///
/// let token = CancellationToken::new();
/// let signal_handler_copy = token.clone();
///
/// signal_handler_copy.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
