//! Ordered associative container with per-item equality.
//!
//! Items carry their own key and decide themselves whether a lookup key
//! matches. Lookups are linear scans in insertion order; there is no hashing,
//! so keys never need a canonical form.

/// An item that owns its key and its notion of key equality.
pub trait Keyed {
    /// Key type, usually a slice.
    type Key: ?Sized;

    /// Returns the item's own key.
    fn key(&self) -> &Self::Key;

    /// Checks whether `key` refers to this item.
    fn matches(&self, key: &Self::Key) -> bool;
}

/// Insertion-ordered list holding at most one item per matching key.
#[derive(Debug)]
pub struct KeyedList<I> {
    items: Vec<I>,
}

impl<I: Keyed> KeyedList<I> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Position of the first item matching `key`.
    pub fn position(&self, key: &I::Key) -> Option<usize> {
        self.items.iter().position(|item| item.matches(key))
    }

    /// Returns the item matching `key`.
    pub fn get(&self, key: &I::Key) -> Option<&I> {
        self.items.iter().find(|item| item.matches(key))
    }

    /// Returns the first item satisfying `pred`.
    pub fn find_mut<P>(&mut self, pred: P) -> Option<&mut I>
    where
        P: FnMut(&&mut I) -> bool,
    {
        self.items.iter_mut().find(pred)
    }

    /// Adds an item.
    ///
    /// If an item matching the new item's key exists, it is replaced in place
    /// and returned; otherwise the item is appended.
    pub fn add(&mut self, item: I) -> Option<I> {
        match self.position(item.key()) {
            Some(index) => Some(std::mem::replace(&mut self.items[index], item)),
            None => {
                self.items.push(item);
                None
            }
        }
    }

    /// Removes the item matching `key`.
    pub fn remove(&mut self, key: &I::Key) -> Option<I> {
        let index = self.position(key)?;
        Some(self.items.remove(index))
    }

    /// Removes the first item satisfying `pred`.
    pub fn remove_where<P>(&mut self, pred: P) -> Option<I>
    where
        P: FnMut(&I) -> bool,
    {
        let index = self.items.iter().position(pred)?;
        Some(self.items.remove(index))
    }

    /// Keeps only the items satisfying `keep`, returning how many were removed.
    pub fn retain<P>(&mut self, keep: P) -> usize
    where
        P: FnMut(&I) -> bool,
    {
        let before = self.items.len();
        self.items.retain(keep);
        before - self.items.len()
    }

    /// Removes every item, returning how many there were.
    pub fn remove_all(&mut self) -> usize {
        let count = self.items.len();
        self.items.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &I> {
        self.items.iter()
    }
}

impl<I: Keyed> Default for KeyedList<I> {
    fn default() -> Self {
        Self::new()
    }
}
