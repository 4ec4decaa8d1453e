use alloc::boxed::Box;
use core::{borrow::Borrow, fmt, iter::FusedIterator, marker::PhantomPinned, mem, ptr::NonNull};

use cordyceps::Linked;

use crate::{AvlTree, Iter, KeyError, Links, Search, TreeNode};

/// An ordered map based on an [AVL tree].
///
/// [AVL tree]: https://en.wikipedia.org/wiki/AVL_tree
pub struct AvlMap<K: Ord, V> {
    tree: AvlTree<MapNode<K, V>>,
}

struct MapNode<K, V> {
    links: Links<MapNode<K, V>>,
    key: K,
    value: V,
    _unpin: PhantomPinned,
}

unsafe impl<K, V> Linked<Links<MapNode<K, V>>> for MapNode<K, V> {
    type Handle = Box<Self>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<MapNode<K, V>>> {
        let ptr = ptr.as_ptr();
        // SAFETY: `ptr` is non-null, so a pointer to one of its fields is as well.
        unsafe { NonNull::new_unchecked(core::ptr::addr_of_mut!((*ptr).links)) }
    }
}

impl<K: Ord, V> TreeNode<Links<MapNode<K, V>>> for MapNode<K, V> {
    type Key = K;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

impl<K: Ord, V> AvlMap<K, V> {
    /// Creates a new, empty `AvlMap`.
    pub const fn new() -> Self {
        Self {
            tree: AvlTree::new(),
        }
    }

    /// Returns `true` if the map contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of elements in the map.
    pub const fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns `true` if the map contains a value associated with `key`.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains_key(key)
    }

    /// Returns a reference to the value associated with `key`.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(key).map(|node| &node.get_ref().value)
    }

    /// Returns a reference to the value associated with `key`, or [`KeyError`] if there is none.
    #[inline]
    pub fn try_get<Q>(&self, key: &Q) -> Result<&V, KeyError>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).ok_or(KeyError)
    }

    /// Returns a mutable reference to the value associated with `key`.
    #[inline]
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree
            .get_mut(key)
            // SAFETY: Pinning is not structural for `node.value`.
            .map(|node| unsafe { &mut node.get_unchecked_mut().value })
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map already contains `key`, its value is overwritten in place and the old value is
    /// returned. The shape of the tree is left untouched in that case.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.tree.search(&key) {
            Search::Found(node) => {
                // SAFETY: `node` is owned by the tree, and pinning is not structural for `value`.
                let slot = unsafe { &mut (*node.as_ptr()).value };
                Some(mem::replace(slot, value))
            }
            Search::Vacant(at) => {
                let node = MapNode::into_ptr(Box::new(MapNode {
                    links: Links::new(),
                    key,
                    value,
                    _unpin: PhantomPinned,
                }));
                unsafe { self.tree.insert_vacant(at, node) };

                None
            }
        }
    }

    /// Removes the value associated with `key` from the map.
    ///
    /// Removing a key that is not present is a no-op.
    #[inline]
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.remove(key).map(|node| node.value)
    }

    /// Removes the value associated with `key`, or returns [`KeyError`] if there is none.
    #[inline]
    pub fn try_remove<Q>(&mut self, key: &Q) -> Result<V, KeyError>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.remove(key).ok_or(KeyError)
    }

    /// Returns the first key-value pair in the map.
    ///
    /// The returned key is the minimum key in the map.
    #[inline]
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.tree
            .first()
            .map(|node| (&node.get_ref().key, &node.get_ref().value))
    }

    /// Removes and returns the first key-value pair in the map.
    ///
    /// The returned key is the minimum key in the map.
    #[inline]
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        self.tree.pop_first().map(|node| {
            let MapNode { key, value, .. } = *node;
            (key, value)
        })
    }

    /// Returns the last key-value pair in the map.
    ///
    /// The returned key is the maximum key in the map.
    #[inline]
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        self.tree
            .last()
            .map(|node| (&node.get_ref().key, &node.get_ref().value))
    }

    /// Removes and returns the last key-value pair in the map.
    ///
    /// The returned key is the maximum key in the map.
    #[inline]
    pub fn pop_last(&mut self) -> Option<(K, V)> {
        self.tree.pop_last().map(|node| {
            let MapNode { key, value, .. } = *node;
            (key, value)
        })
    }

    /// Returns an iterator over the entries of the map, sorted by key.
    pub fn iter(&self) -> MapIter<'_, K, V> {
        MapIter {
            inner: self.tree.iter(),
        }
    }

    /// Returns the height of the underlying tree.
    pub fn height(&self) -> usize {
        self.tree.height()
    }

    /// Clears the map, removing all elements.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        self.tree.assert_invariants();
    }
}

impl<K: Ord, V> Default for AvlMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + fmt::Debug, V: fmt::Debug> fmt::Debug for AvlMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// An iterator over the entries of an [`AvlMap`], sorted by key.
pub struct MapIter<'map, K: Ord, V> {
    inner: Iter<'map, MapNode<K, V>>,
}

impl<'map, K: Ord, V> Iterator for MapIter<'map, K, V> {
    type Item = (&'map K, &'map V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|node| (&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'map, K: Ord, V> DoubleEndedIterator for MapIter<'map, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|node| (&node.key, &node.value))
    }
}

impl<'map, K: Ord, V> ExactSizeIterator for MapIter<'map, K, V> {}

impl<'map, K: Ord, V> FusedIterator for MapIter<'map, K, V> {}

impl<'map, K: Ord, V> IntoIterator for &'map AvlMap<K, V> {
    type Item = (&'map K, &'map V);
    type IntoIter = MapIter<'map, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::{format, prelude::v1::*};

    use super::*;

    #[test]
    fn upsert_overwrites_value() {
        let mut map = AvlMap::new();

        assert_eq!(map.insert(5, "a"), None);
        assert_eq!(map.insert(5, "b"), Some("a"));

        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&5), Some(&"b"));
        assert_eq!(map.height(), 1);
        map.assert_invariants();
    }

    #[test]
    fn overwrite_keeps_shape() {
        let mut map = AvlMap::new();
        for key in 1..=7 {
            assert_eq!(map.insert(key, key * 10), None);
        }

        for key in (1..=7).rev() {
            assert_eq!(map.insert(key, key), Some(key * 10));
            map.assert_invariants();
        }

        assert_eq!(map.len(), 7);
        assert_eq!(map.height(), 3);
        assert!(map.iter().all(|(k, v)| k == v));

        assert_eq!(map.insert(8, 8), None);
        assert_eq!(map.len(), 8);
        assert_eq!(map.height(), 4);
        map.assert_invariants();
    }

    #[test]
    fn strict_lookups() {
        let mut map = AvlMap::new();
        map.insert(1, 10);

        assert_eq!(map.try_get(&1), Ok(&10));
        assert_eq!(map.try_get(&2), Err(KeyError));
        assert_eq!(map.try_remove(&2), Err(KeyError));
        assert_eq!(map.try_remove(&1), Ok(10));
        assert!(map.is_empty());
        assert_eq!(KeyError.to_string(), "key not found");
    }

    #[test]
    fn get_mut_updates_in_place() {
        let mut map = AvlMap::new();
        map.insert("x", 1);

        *map.get_mut("x").unwrap() += 1;

        assert_eq!(map.get("x"), Some(&2));
        assert_eq!(map.get_mut("y"), None);
    }

    #[test]
    fn extremes() {
        let mut map = AvlMap::new();
        assert_eq!(map.first_key_value(), None);
        assert_eq!(map.pop_last(), None);

        for key in [4, 2, 6, 1, 3, 5, 7] {
            map.insert(key, key * 10);
        }

        assert_eq!(map.first_key_value(), Some((&1, &10)));
        assert_eq!(map.last_key_value(), Some((&7, &70)));
        assert_eq!(map.pop_first(), Some((1, 10)));
        assert_eq!(map.pop_last(), Some((7, 70)));
        map.assert_invariants();

        let keys: Vec<_> = map.iter().map(|(&k, _)| k).collect();
        assert_eq!(keys, [2, 3, 4, 5, 6]);

        let rev: Vec<_> = map.iter().rev().map(|(&k, _)| k).collect();
        assert_eq!(rev, [6, 5, 4, 3, 2]);
    }

    #[test]
    fn owned_values_are_dropped() {
        use std::rc::Rc;

        let value = Rc::new(());
        let mut map = AvlMap::new();

        for key in 0..32 {
            map.insert(key, Rc::clone(&value));
        }
        assert_eq!(Rc::strong_count(&value), 33);

        map.remove(&3);
        assert_eq!(Rc::strong_count(&value), 32);

        map.clear();
        assert_eq!(Rc::strong_count(&value), 1);
        assert!(map.is_empty());

        map.insert(0, Rc::clone(&value));
        drop(map);
        assert_eq!(Rc::strong_count(&value), 1);
    }

    #[test]
    fn debug_output() {
        let mut map = AvlMap::new();
        map.insert(2, 'b');
        map.insert(1, 'a');

        assert_eq!(format!("{map:?}"), "{1: 'a', 2: 'b'}");
    }
}
