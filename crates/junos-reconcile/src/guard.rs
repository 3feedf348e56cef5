//! Read guard serializing configuration reads against each other and
//! against post-commit verification.
//!
//! The guard is a value, not a global: every coordinator built from the
//! same guard shares one critical section, and independent devices (or
//! tests) get independent guards.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::trace;

/// Process-wide read serialization for one device.
#[derive(Debug, Clone, Default)]
pub struct ReadGuard {
    inner: Arc<Mutex<()>>,
}

/// Held while a read-then-reconstruct sequence runs.
pub type ReadPermit<'a> = MutexGuard<'a, ()>;

impl ReadGuard {
    /// Creates an unshared guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive read access.
    pub async fn acquire(&self) -> ReadPermit<'_> {
        trace!("Waiting for read guard");
        self.inner.lock().await
    }

    /// Returns true if both handles share one critical section.
    pub fn same_as(&self, other: &ReadGuard) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
