//! # Suspense
//!
//! In-memory memoization cache for async resolvers.
//!
//! A caller hands the cache a resolver and a key. The cache answers with the
//! cached value, the cached error, or a pending handle to await before asking
//! again. Only one computation runs per key at a time.
//!
//! ## Modules
//!
//! - [`cache`] - The suspense cache and its building blocks
//! - [`cli`] - Command line interface
//! - [`types`] - Configuration and error types

pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod types;

pub use cache::{PendingHandle, Settlement, SuspendOptions, Suspense, SuspenseCache};
pub use types::config::Config;
pub use types::errors::{ResolveError, SuspenseError, SuspenseResult};
