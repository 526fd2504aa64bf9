//! Reconciliation lock handles.

use crate::error::DbResult;
use async_trait::async_trait;

/// Backend-specific handle for a held reconciliation lock.
///
/// Dropping a handle without calling [`HeldLock::release`] must still free
/// the lock (closing the session, dropping the mutex guard), only less
/// promptly and without reporting errors.
#[async_trait]
pub trait HeldLock: Send {
    /// Release the lock explicitly.
    async fn release(self: Box<Self>) -> DbResult<()>;
}

/// Exclusive right to reconcile one database.
///
/// Obtained from [`crate::StoreLock::acquire_lock`]. Call [`LockGuard::release`]
/// on every exit path; a guard dropped while still held logs a warning and
/// falls back to the backend's drop behaviour.
pub struct LockGuard {
    name: String,
    inner: Option<Box<dyn HeldLock>>,
}

impl LockGuard {
    pub fn new(name: impl Into<String>, held: Box<dyn HeldLock>) -> Self {
        Self {
            name: name.into(),
            inner: Some(held),
        }
    }

    /// Lock name used in logs, e.g. `duckdb:app.duckdb`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Release the lock.
    pub async fn release(mut self) -> DbResult<()> {
        match self.inner.take() {
            Some(held) => {
                held.release().await?;
                log::debug!("Released reconciliation lock {}", self.name);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("name", &self.name)
            .field("held", &self.inner.is_some())
            .finish()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.inner.take().is_some() {
            log::warn!(
                "Reconciliation lock {} dropped without explicit release",
                self.name
            );
        }
    }
}
