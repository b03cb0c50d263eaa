//! Cache entries and their state machine.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use super::handle::{PendingHandle, Suspense};
use super::key::KeyEq;
use super::keyed::Keyed;

/// Observable state of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Fulfilled,
    Rejected,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryStatus::Pending => write!(f, "pending"),
            EntryStatus::Fulfilled => write!(f, "fulfilled"),
            EntryStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// State of a memoized computation.
pub(crate) enum EntryState<V, E> {
    Pending(PendingHandle),
    Fulfilled(Arc<V>),
    Rejected(Arc<E>),
}

impl<V, E> EntryState<V, E> {
    pub(crate) fn status(&self) -> EntryStatus {
        match self {
            EntryState::Pending(_) => EntryStatus::Pending,
            EntryState::Fulfilled(_) => EntryStatus::Fulfilled,
            EntryState::Rejected(_) => EntryStatus::Rejected,
        }
    }

    /// What a lookup landing on this state reports.
    pub(crate) fn outcome(&self) -> Suspense<V, E> {
        match self {
            EntryState::Pending(handle) => Suspense::Pending(handle.clone()),
            EntryState::Fulfilled(value) => Suspense::Ready(Arc::clone(value)),
            EntryState::Rejected(error) => Suspense::Failed(Arc::clone(error)),
        }
    }
}

/// One memoized computation.
pub(crate) struct CacheEntry<T, V, E> {
    pub(crate) id: u64,
    pub(crate) key: Vec<T>,
    pub(crate) equal: KeyEq<T>,
    pub(crate) lifespan: Option<Duration>,
    pub(crate) state: EntryState<V, E>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) settled_at: Option<DateTime<Utc>>,
    /// Deadline of a fulfilled entry with a lifespan, on the runtime clock.
    pub(crate) expires_at: Option<Instant>,
}

impl<T, V, E> CacheEntry<T, V, E> {
    pub(crate) fn pending(
        id: u64,
        key: Vec<T>,
        equal: KeyEq<T>,
        lifespan: Option<Duration>,
        handle: PendingHandle,
    ) -> Self {
        Self {
            id,
            key,
            equal,
            lifespan,
            state: EntryState::Pending(handle),
            created_at: Utc::now(),
            settled_at: None,
            expires_at: None,
        }
    }

    /// Replaces the state in place. Only pending entries settle.
    ///
    /// A fulfilled entry with a lifespan starts its expiry clock here.
    pub(crate) fn settle(&mut self, state: EntryState<V, E>) -> bool {
        if !matches!(self.state, EntryState::Pending(_)) {
            return false;
        }
        if matches!(state, EntryState::Fulfilled(_)) {
            self.expires_at = self
                .lifespan
                .and_then(|lifespan| Instant::now().checked_add(lifespan));
        }
        self.state = state;
        self.settled_at = Some(Utc::now());
        true
    }

    /// Whether the entry's lifespan has run out at `now`.
    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }

    pub(crate) fn snapshot(&self) -> EntrySnapshot<T>
    where
        T: Clone,
    {
        EntrySnapshot {
            id: self.id,
            key: self.key.clone(),
            status: self.state.status(),
            created_at: self.created_at,
            settled_at: self.settled_at,
            lifespan_ms: self
                .lifespan
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}

impl<T, V, E> Keyed for CacheEntry<T, V, E> {
    type Key = [T];

    fn key(&self) -> &[T] {
        &self.key
    }

    fn matches(&self, key: &[T]) -> bool {
        (self.equal)(key, &self.key)
    }
}

/// Point-in-time view of an entry.
#[derive(Debug, Clone, Serialize)]
pub struct EntrySnapshot<T> {
    pub id: u64,
    pub key: Vec<T>,
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
    pub lifespan_ms: Option<u64>,
}
