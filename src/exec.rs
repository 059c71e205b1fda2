//! Execution-model seam
//!
//! The transport never calls `tokio::spawn` directly; background work
//! (connection handlers, queue drains) is submitted through [`Spawn`], so the
//! scheduling model is decided once, at construction.

use std::future::Future;
use std::pin::Pin;

pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub trait Spawn: Send + Sync {
    fn spawn(&self, task: TaskFuture);
}

/// Tokio-backed implementation: one task per submission.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawn;

impl Spawn for TokioSpawn {
    fn spawn(&self, task: TaskFuture) {
        tokio::spawn(task);
    }
}
