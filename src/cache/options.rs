//! Per-call options for `suspend` and `preload`.

use std::fmt;
use std::time::Duration;

use super::key::{key_eq, KeyEq};

/// Options applied when a lookup creates a new entry.
///
/// Both settings are frozen into the entry at creation. They have no effect
/// on a lookup that lands on an existing entry.
pub struct SuspendOptions<T> {
    /// Key comparator for the new entry. Defaults to pairwise equality.
    pub equal: Option<KeyEq<T>>,

    /// Time the entry stays cached after it is fulfilled.
    pub lifespan: Option<Duration>,
}

impl<T> SuspendOptions<T> {
    pub fn new() -> Self {
        Self {
            equal: None,
            lifespan: None,
        }
    }

    /// Sets a custom key comparator.
    pub fn with_equal<F>(mut self, equal: F) -> Self
    where
        F: Fn(&[T], &[T]) -> bool + Send + Sync + 'static,
    {
        self.equal = Some(key_eq(equal));
        self
    }

    /// Sets the post-fulfillment lifespan.
    pub fn with_lifespan(mut self, lifespan: Duration) -> Self {
        self.lifespan = Some(lifespan);
        self
    }
}

impl<T> Default for SuspendOptions<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for SuspendOptions<T> {
    fn clone(&self) -> Self {
        Self {
            equal: self.equal.clone(),
            lifespan: self.lifespan,
        }
    }
}

impl<T> fmt::Debug for SuspendOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuspendOptions")
            .field("equal", &self.equal.as_ref().map(|_| "custom"))
            .field("lifespan", &self.lifespan)
            .finish()
    }
}
