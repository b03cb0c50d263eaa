//! Lookup outcomes and pending handles.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use serde::Serialize;

use super::entry::EntryStatus;

/// How an in-flight computation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Settlement {
    /// The resolver produced a value.
    Fulfilled,
    /// The resolver produced an error.
    Rejected,
    /// The computation went away without a result (resolver panic or
    /// runtime shutdown). Its entry, if any, has been removed.
    Abandoned,
}

impl fmt::Display for Settlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Settlement::Fulfilled => write!(f, "fulfilled"),
            Settlement::Rejected => write!(f, "rejected"),
            Settlement::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Result of a cache lookup.
///
/// `Pending` is not a failure: it carries a handle to await before retrying
/// the same lookup.
pub enum Suspense<V, E> {
    /// The value is cached.
    Ready(Arc<V>),
    /// The value is being computed.
    Pending(PendingHandle),
    /// The computation failed; the error stays cached until cleared.
    Failed(Arc<E>),
}

impl<V, E> Suspense<V, E> {
    pub fn status(&self) -> EntryStatus {
        match self {
            Suspense::Ready(_) => EntryStatus::Fulfilled,
            Suspense::Pending(_) => EntryStatus::Pending,
            Suspense::Failed(_) => EntryStatus::Rejected,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Suspense::Ready(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Suspense::Pending(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Suspense::Failed(_))
    }

    /// Returns the value, if ready.
    pub fn ready(self) -> Option<Arc<V>> {
        match self {
            Suspense::Ready(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the pending handle, if pending.
    pub fn pending(self) -> Option<PendingHandle> {
        match self {
            Suspense::Pending(handle) => Some(handle),
            _ => None,
        }
    }

    /// Returns the error, if failed.
    pub fn failed(self) -> Option<Arc<E>> {
        match self {
            Suspense::Failed(error) => Some(error),
            _ => None,
        }
    }
}

impl<V, E> Clone for Suspense<V, E> {
    fn clone(&self) -> Self {
        match self {
            Suspense::Ready(value) => Suspense::Ready(Arc::clone(value)),
            Suspense::Pending(handle) => Suspense::Pending(handle.clone()),
            Suspense::Failed(error) => Suspense::Failed(Arc::clone(error)),
        }
    }
}

impl<V: fmt::Debug, E: fmt::Debug> fmt::Debug for Suspense<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suspense::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Suspense::Pending(handle) => f.debug_tuple("Pending").field(handle).finish(),
            Suspense::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
        }
    }
}

// `Shared` needs a cloneable output, so the receiver only ever carries the
// settlement kind; the value itself is read back from the cache.
type SettlementChannel = Shared<oneshot::Receiver<Settlement>>;

/// Awaitable handle to an in-flight computation.
///
/// Every lookup that lands on the same pending entry gets a clone of the same
/// handle. It completes once the computation settles.
#[derive(Clone)]
pub struct PendingHandle {
    id: u64,
    settled: SettlementChannel,
}

impl PendingHandle {
    pub(crate) fn channel(id: u64) -> (oneshot::Sender<Settlement>, Self) {
        let (tx, rx) = oneshot::channel();
        let handle = Self {
            id,
            settled: rx.shared(),
        };
        (tx, handle)
    }

    /// Identity of the entry this computation was started for.
    pub fn entry_id(&self) -> u64 {
        self.id
    }

    /// Checks whether both handles wait on one computation.
    pub fn same_computation(&self, other: &PendingHandle) -> bool {
        self.id == other.id
    }

    /// Returns the settlement if the computation already ended.
    pub fn settlement(&self) -> Option<Settlement> {
        self.settled.peek().map(|result| match result {
            Ok(settlement) => *settlement,
            Err(_) => Settlement::Abandoned,
        })
    }
}

impl Future for PendingHandle {
    type Output = Settlement;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.settled
            .poll_unpin(cx)
            .map(|result| result.unwrap_or(Settlement::Abandoned))
    }
}

impl fmt::Debug for PendingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingHandle")
            .field("id", &self.id)
            .field("settlement", &self.settlement())
            .finish()
    }
}
