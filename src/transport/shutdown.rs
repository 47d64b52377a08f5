//! Idempotent shutdown signalling.
//!
//! [`ShutdownSignal`] is shared between a [`super::ThrottledTransport`] and its
//! dispatcher task. Requesting shutdown more than once is a no-op, and waiters
//! that arrive after the request return immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Shared handle to a shutdown signal.
pub type SharedShutdown = Arc<ShutdownSignal>;

/// One-shot shutdown flag with async waiters.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    is_shutdown: AtomicBool,
    notify: Notify,
}

impl ShutdownSignal {
    /// Create a new signal.
    pub fn new() -> Self {
        Self {
            is_shutdown: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Create a new shared signal wrapped in [`Arc`].
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::new())
    }

    /// Request shutdown. Returns `true` only for the call that flipped the flag.
    pub fn request_shutdown(&self) -> bool {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.notify.notify_waiters();
        true
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }

    /// Wait until shutdown is requested. Returns immediately if already set.
    pub async fn wait_for_shutdown(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent request cannot slip between.
        notified.as_mut().enable();
        if self.is_shutdown_requested() {
            return;
        }
        notified.await;
    }
}
