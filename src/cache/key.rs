//! Key comparison.

use std::sync::Arc;

/// Equality predicate over two keys.
///
/// Called as `equal(lookup_key, stored_key)`. The predicate bound to an entry
/// at creation is the one used for every later comparison against it.
pub type KeyEq<T> = Arc<dyn Fn(&[T], &[T]) -> bool + Send + Sync>;

/// Default key comparator: same slice, or same length and pairwise `==`.
pub fn shallow_equal<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    std::ptr::eq(a, b) || (a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y))
}

/// Wraps [`shallow_equal`] as a [`KeyEq`].
pub fn default_equal<T: PartialEq + 'static>() -> KeyEq<T> {
    Arc::new(shallow_equal::<T>)
}

/// Wraps a closure as a [`KeyEq`].
pub fn key_eq<T, F>(f: F) -> KeyEq<T>
where
    F: Fn(&[T], &[T]) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}
