//! Fixed-capacity concurrency gate for non-streaming requests
//!
//! Slots are acquired with a non-blocking attempt only; a request that finds
//! the gate full is rejected immediately rather than queued. Streaming
//! upgrades bypass the gate entirely.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone)]
pub struct RateLimiter {
    slots: Arc<Semaphore>,
    capacity: usize,
}

/// A held slot. Dropping it releases the slot, so release happens on every
/// exit path of a handler.
#[derive(Debug)]
pub struct RequestSlot {
    _permit: OwnedSemaphorePermit,
}

impl RateLimiter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn try_acquire(&self) -> Option<RequestSlot> {
        Arc::clone(&self.slots)
            .try_acquire_owned()
            .ok()
            .map(|permit| RequestSlot { _permit: permit })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}
