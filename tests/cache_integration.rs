//! Integration tests for the suspense cache.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use suspense::cache::EntryStatus;
use suspense::types::config::CacheConfig;
use suspense::{ResolveError, Settlement, SuspendOptions, Suspense, SuspenseCache};
use tokio::time::{sleep, sleep_until, Instant};

#[derive(Debug, Clone, PartialEq)]
struct User {
    name: String,
}

impl User {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("user {0} not found")]
struct NotFoundError(String);

type UserCache = SuspenseCache<&'static str, User, NotFoundError>;

fn user_cache() -> UserCache {
    SuspenseCache::new(&CacheConfig::default()).unwrap()
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

async fn fetch_user(key: Vec<&'static str>) -> Result<User, NotFoundError> {
    sleep(ms(5)).await;
    match key.first() {
        Some(&"u1") => Ok(User::new("Alice")),
        Some(id) => Err(NotFoundError(id.to_string())),
        None => Err(NotFoundError(String::new())),
    }
}

async fn exploding(_key: Vec<&'static str>) -> Result<User, NotFoundError> {
    panic!("resolver exploded")
}

fn case_insensitive(a: &[&'static str], b: &[&'static str]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_ignore_ascii_case(y))
}

// Scenarios
mod scenario_tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_user_round_trip() {
        let cache = user_cache();

        let first = cache.suspend(fetch_user, vec!["u1"], SuspendOptions::new());
        let handle = match first {
            Suspense::Pending(handle) => handle,
            other => panic!("expected pending, got {:?}", other),
        };
        assert_eq!(handle.await, Settlement::Fulfilled);

        let user = cache
            .suspend(fetch_user, vec!["u1"], SuspendOptions::new())
            .ready()
            .unwrap();
        assert_eq!(*user, User::new("Alice"));
        assert_eq!(cache.peek(&["u1"]).as_deref(), Some(&User::new("Alice")));
    }

    #[tokio::test]
    async fn test_preload_rejection_resurfaces() {
        let cache = user_cache();

        assert!(cache.preload(fetch_user, vec!["u2"], SuspendOptions::new()).is_ok());

        let handle = cache
            .suspend(fetch_user, vec!["u2"], SuspendOptions::new())
            .pending()
            .unwrap();
        assert_eq!(handle.await, Settlement::Rejected);

        let error = cache
            .preload(fetch_user, vec!["u2"], SuspendOptions::new())
            .unwrap_err();
        assert_eq!(error.to_string(), "user u2 not found");
    }
}

// Coalescing and key identity
mod coalescing_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_lookups_start_one_computation() {
        let cache = user_cache();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            let calls = calls.clone();
            tasks.push(tokio::spawn(async move {
                let resolver = move |key: Vec<&'static str>| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        sleep(ms(20)).await;
                        Ok::<_, NotFoundError>(User::new(key[0]))
                    }
                };
                cache.resolve(&resolver, vec!["u1"], SuspendOptions::new()).await
            }));
        }

        for task in tasks {
            let user = task.await.unwrap().unwrap();
            assert_eq!(user.name, "u1");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_pending_resolver_is_not_reissued() {
        let cache = user_cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let resolver = move |key: Vec<&'static str>| {
            counter.fetch_add(1, Ordering::SeqCst);
            fetch_user(key)
        };

        let handles: Vec<_> = (0..5)
            .map(|_| {
                cache
                    .suspend(&resolver, vec!["u1"], SuspendOptions::new())
                    .pending()
                    .unwrap()
            })
            .collect();

        assert!(handles.iter().all(|h| h.same_computation(&handles[0])));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().coalesced, 4);
    }

    #[tokio::test]
    async fn test_custom_equality_keeps_one_entry() {
        let cache = user_cache();
        let options = SuspendOptions::new().with_equal(case_insensitive);

        let first = cache.suspend(fetch_user, vec!["U1"], options.clone()).pending().unwrap();
        let second = cache.suspend(fetch_user, vec!["u1"], options).pending().unwrap();

        assert!(first.same_computation(&second));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_stored_comparator_is_frozen() {
        let cache = user_cache();

        cache.suspend(
            fetch_user,
            vec!["Alice"],
            SuspendOptions::new().with_equal(case_insensitive),
        );

        // The lookup's own comparator is irrelevant once the entry exists
        let outcome = cache.suspend(
            fetch_user,
            vec!["ALICE"],
            SuspendOptions::new().with_equal(|a: &[&'static str], b: &[&'static str]| a == b),
        );
        assert!(outcome.is_pending());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.status(&["alice"]), Some(EntryStatus::Pending));

        // Default comparators still distinguish other keys
        cache.suspend(fetch_user, vec!["Bob"], SuspendOptions::new());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.status(&["bob"]), None);
    }

    #[tokio::test]
    async fn test_multi_part_keys() {
        let cache = user_cache();

        cache.suspend(fetch_user, vec!["u1", "profile"], SuspendOptions::new());
        cache.suspend(fetch_user, vec!["u1", "posts"], SuspendOptions::new());
        cache.suspend(fetch_user, vec!["u1"], SuspendOptions::new());
        cache.suspend(fetch_user, vec!["u1", "profile"], SuspendOptions::new());

        assert_eq!(cache.len(), 3);
    }
}

// Settled states
mod settlement_tests {
    use super::*;

    #[tokio::test]
    async fn test_peek_is_idempotent() {
        let cache = user_cache();

        assert!(cache.peek(&["u1"]).is_none());
        assert!(cache.is_empty());

        let handle = cache.suspend(fetch_user, vec!["u1"], SuspendOptions::new()).pending().unwrap();
        assert!(cache.peek(&["u1"]).is_none());

        handle.await;
        let stats_before = cache.stats();

        let first = cache.peek(&["u1"]).unwrap();
        let second = cache.peek(&["u1"]).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let stats_after = cache.stats();
        assert_eq!(stats_before.lookups(), stats_after.lookups());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_peek_hides_rejections() {
        let cache = user_cache();

        let handle = cache.suspend(fetch_user, vec!["u9"], SuspendOptions::new()).pending().unwrap();
        handle.await;

        assert!(cache.peek(&["u9"]).is_none());
        assert_eq!(cache.status(&["u9"]), Some(EntryStatus::Rejected));
    }

    #[tokio::test]
    async fn test_rejection_persists_until_cleared() {
        let cache = user_cache();

        let err = cache
            .resolve(&fetch_user, vec!["u2"], SuspendOptions::new())
            .await
            .unwrap_err();
        let first = err.rejection().cloned().unwrap();

        for _ in 0..3 {
            let error = cache.suspend(fetch_user, vec!["u2"], SuspendOptions::new()).failed().unwrap();
            assert!(Arc::ptr_eq(&first, &error));
            assert!(cache.preload(fetch_user, vec!["u2"], SuspendOptions::new()).is_err());
        }

        assert!(cache.clear(&["u2"]));

        let fallback = |_key: Vec<&'static str>| async { Ok::<_, NotFoundError>(User::new("Bob")) };
        let recovered = cache
            .resolve(&fallback, vec!["u2"], SuspendOptions::new())
            .await
            .unwrap();
        assert_eq!(recovered.name, "Bob");
    }

    #[tokio::test]
    async fn test_rejection_is_isolated_per_key() {
        let cache = user_cache();

        let rejected = cache.resolve(&fetch_user, vec!["u2"], SuspendOptions::new()).await;
        let fulfilled = cache.resolve(&fetch_user, vec!["u1"], SuspendOptions::new()).await;

        assert!(matches!(rejected, Err(ResolveError::Rejected(_))));
        assert_eq!(fulfilled.unwrap().name, "Alice");
    }

    #[tokio::test]
    async fn test_panicking_resolver_leaves_no_entry() {
        let cache = user_cache();

        let err = cache
            .resolve(&exploding, vec!["u1"], SuspendOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::Abandoned));
        assert!(cache.is_empty());

        let user = cache.resolve(&fetch_user, vec!["u1"], SuspendOptions::new()).await.unwrap();
        assert_eq!(user.name, "Alice");
    }

    #[tokio::test]
    async fn test_resolver_panicking_before_future_leaves_no_entry() {
        let cache = user_cache();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            cache.suspend(
                |_key| -> futures::future::Ready<Result<User, NotFoundError>> {
                    panic!("resolver exploded")
                },
                vec!["u1"],
                SuspendOptions::new(),
            )
        }));

        assert!(result.is_err());
        assert!(cache.is_empty());
    }
}

// Clearing
mod clear_tests {
    use super::*;

    #[tokio::test]
    async fn test_clear_one_key() {
        let cache = user_cache();
        let resolver = |key: Vec<&'static str>| async move { Ok::<_, NotFoundError>(User::new(key[0])) };

        for key in ["a", "b", "c"] {
            cache.resolve(&resolver, vec![key], SuspendOptions::new()).await.unwrap();
        }

        assert!(cache.clear(&["b"]));
        assert_eq!(cache.len(), 2);
        assert!(cache.peek(&["a"]).is_some());
        assert!(cache.peek(&["b"]).is_none());
        assert!(cache.peek(&["c"]).is_some());

        assert!(!cache.clear(&["missing"]));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let cache = user_cache();
        let resolver = |key: Vec<&'static str>| async move { Ok::<_, NotFoundError>(User::new(key[0])) };

        cache.resolve(&resolver, vec!["a"], SuspendOptions::new()).await.unwrap();
        cache.resolve(&fetch_user, vec!["u2"], SuspendOptions::new()).await.unwrap_err();
        cache.suspend(&resolver, vec!["c"], SuspendOptions::new());

        assert_eq!(cache.clear_all(), 3);
        assert!(cache.is_empty());
        assert_eq!(cache.clear_all(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleared_pending_entry_never_overwrites_newer_entry() {
        let cache = user_cache();
        let old_resolver = |_key: Vec<&'static str>| async {
            sleep(ms(10)).await;
            Ok::<_, NotFoundError>(User::new("old"))
        };
        let new_resolver = |_key: Vec<&'static str>| async {
            sleep(ms(50)).await;
            Ok::<_, NotFoundError>(User::new("new"))
        };

        let old = cache.suspend(old_resolver, vec!["u1"], SuspendOptions::new()).pending().unwrap();
        assert!(cache.clear(&["u1"]));
        let new = cache.suspend(new_resolver, vec!["u1"], SuspendOptions::new()).pending().unwrap();
        assert!(!old.same_computation(&new));

        assert_eq!(old.await, Settlement::Fulfilled);
        assert_eq!(cache.status(&["u1"]), Some(EntryStatus::Pending));
        assert!(cache.peek(&["u1"]).is_none());

        assert_eq!(new.await, Settlement::Fulfilled);
        assert_eq!(cache.peek(&["u1"]).unwrap().name, "new");
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_restarts_after_clear() {
        let cache = user_cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let resolver = move |key: Vec<&'static str>| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                sleep(ms(20)).await;
                Ok::<_, NotFoundError>(User::new(key[0]))
            }
        };

        let waiter = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.resolve(&resolver, vec!["u1"], SuspendOptions::new()).await })
        };

        sleep(ms(5)).await;
        assert!(cache.clear(&["u1"]));

        let user = waiter.await.unwrap().unwrap();
        assert_eq!(user.name, "u1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

// Lifespan expiry
mod lifespan_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_lifespan() {
        let cache = user_cache();
        let options = SuspendOptions::new().with_lifespan(ms(100));

        let handle = cache.suspend(fetch_user, vec!["u1"], options).pending().unwrap();
        handle.await;
        let fulfilled_at = Instant::now();

        assert!(cache.peek(&["u1"]).is_some());

        sleep_until(fulfilled_at + ms(99)).await;
        assert!(cache.peek(&["u1"]).is_some());

        sleep_until(fulfilled_at + ms(101)).await;
        assert!(cache.peek(&["u1"]).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_absent_exactly_at_deadline() {
        let cache = user_cache();
        let options = SuspendOptions::new().with_lifespan(ms(100));

        let handle = cache.suspend(fetch_user, vec!["u1"], options).pending().unwrap();
        handle.await;
        let fulfilled_at = Instant::now();

        sleep_until(fulfilled_at + ms(100)).await;
        assert!(cache.peek(&["u1"]).is_none());
        assert_eq!(cache.status(&["u1"]), None);
        assert!(cache.snapshot().is_empty());

        let outcome = cache.suspend(fetch_user, vec!["u1"], SuspendOptions::new());
        assert!(outcome.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_entry_does_not_expire() {
        let cache = user_cache();
        let options = SuspendOptions::new().with_lifespan(ms(50));

        let handle = cache.suspend(fetch_user, vec!["u2"], options).pending().unwrap();
        assert_eq!(handle.await, Settlement::Rejected);

        sleep(ms(200)).await;
        assert_eq!(cache.status(&["u2"]), Some(EntryStatus::Rejected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_spares_newer_entry() {
        let cache = user_cache();

        cache
            .resolve(&fetch_user, vec!["u1"], SuspendOptions::new().with_lifespan(ms(100)))
            .await
            .unwrap();
        assert!(cache.clear(&["u1"]));

        cache.resolve(&fetch_user, vec!["u1"], SuspendOptions::new()).await.unwrap();

        sleep(ms(200)).await;
        assert!(cache.peek(&["u1"]).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_default_lifespan_applies() {
        let config = CacheConfig {
            name: "users".to_string(),
            default_lifespan_ms: Some(30),
        };
        let cache: UserCache = SuspenseCache::new(&config).unwrap();

        cache.resolve(&fetch_user, vec!["u1"], SuspendOptions::new()).await.unwrap();
        assert!(cache.peek(&["u1"]).is_some());

        sleep(ms(40)).await;
        assert!(cache.peek(&["u1"]).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_lifespan_overrides_default() {
        let config = CacheConfig {
            name: "users".to_string(),
            default_lifespan_ms: Some(30),
        };
        let cache: UserCache = SuspenseCache::new(&config).unwrap();

        cache
            .resolve(&fetch_user, vec!["u1"], SuspendOptions::new().with_lifespan(ms(500)))
            .await
            .unwrap();

        sleep(ms(100)).await;
        assert!(cache.peek(&["u1"]).is_some());
    }
}
