//! Task spawning and fire-once timers on a tokio runtime.

use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;

use crate::{SuspenseError, SuspenseResult};

/// Runs settlement tasks and delayed callbacks for a cache.
#[derive(Debug, Clone)]
pub struct Scheduler {
    handle: Handle,
}

impl Scheduler {
    /// Creates a scheduler on the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Creates a scheduler on the runtime of the calling context.
    pub fn current() -> SuspenseResult<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| SuspenseError::NoRuntime)
    }

    /// Spawns a detached task.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(task);
    }

    /// Runs `callback` once after `delay`. There is no way to cancel it.
    pub fn schedule<F>(&self, delay: Duration, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
    }
}
