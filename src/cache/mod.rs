//! Suspense cache for async resolvers.
//!
//! [`SuspenseCache::suspend`] answers a key from the cache or starts the
//! resolver and reports [`Suspense::Pending`] with a handle to await before
//! retrying. Concurrent lookups of an equal key share one computation.
//! Fulfilled entries may expire after a lifespan; failed entries stay until
//! cleared.

mod entry;
mod handle;
mod key;
mod keyed;
mod options;
mod schedule;
mod stats;
mod suspense;

pub use entry::{EntrySnapshot, EntryStatus};
pub use handle::{PendingHandle, Settlement, Suspense};
pub use key::{default_equal, key_eq, shallow_equal, KeyEq};
pub use keyed::{Keyed, KeyedList};
pub use options::SuspendOptions;
pub use schedule::Scheduler;
pub use stats::CacheStats;
pub use suspense::SuspenseCache;
