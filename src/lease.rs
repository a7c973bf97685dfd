// src/lease.rs

//! Exclusive access to the renderer.
//!
//! Only one renderer process should run per slot. Callers acquire a
//! [`RendererLease`] from a shared [`RendererSlot`] and pass it to
//! [`Supervisor::run`](crate::exec::Supervisor::run); dropping the lease frees
//! the slot.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::debug;

/// Shared "one renderer active" guard.
#[derive(Debug, Clone)]
pub struct RendererSlot {
    permits: Arc<Semaphore>,
}

/// Proof that the holder currently owns the renderer slot.
#[derive(Debug)]
pub struct RendererLease {
    _permit: OwnedSemaphorePermit,
}

impl RendererSlot {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
        }
    }

    /// Wait until the slot is free and take it.
    pub async fn acquire(&self) -> RendererLease {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .unwrap_or_else(|_| unreachable!("renderer slot semaphore is never closed"));
        debug!("renderer lease acquired");
        RendererLease { _permit: permit }
    }

    /// Take the slot if nobody holds it.
    pub fn try_acquire(&self) -> Option<RendererLease> {
        match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => Some(RendererLease { _permit: permit }),
            Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => None,
        }
    }

    /// Whether a lease is currently outstanding.
    pub fn is_busy(&self) -> bool {
        self.permits.available_permits() == 0
    }
}

impl Default for RendererSlot {
    fn default() -> Self {
        Self::new()
    }
}
