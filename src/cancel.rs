//! Request-scoped cancellation
//!
//! A `CancelToken` is cloned into every read a request performs. Readers
//! check it between queries and while streaming rows, so a cancelled
//! request stops early instead of producing a partial result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::StorageError;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the request as cancelled; all clones observe it
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with `StorageError::Cancelled` if cancellation was requested
    pub fn check(&self, stage: &str) -> Result<(), StorageError> {
        if self.is_cancelled() {
            return Err(StorageError::Cancelled(stage.to_string()));
        }
        Ok(())
    }
}
