//! An intrusive AVL tree.
#![no_std]

// Conventions used in comments:
// - The balance of a node `x` is denoted `b(x)` and equals `h(right(x)) - h(left(x))`, where the
//   height of a missing subtree is 0.
// - A node is left-heavy if `b(x) < 0` and right-heavy if `b(x) > 0`.
// - The parent of a node `x` is denoted `p(x)`.
//
// The fundamental invariants of an AVL tree are:
// 1. Keys are in search tree order.
// 2. `|b(x)| <= 1` for every node `x`.
//
// Corollaries:
// 3. A tree with `n` nodes has height at most ~1.44 * log2(n + 2).
// 4. If `|b(x)| == 1`, the heavy child of `x` is present. If `x` has a single child, that child
//    is a leaf.
//
// Both rebalancing routines walk from the mutation point towards the root. Each step either
// proves that the height of the current subtree did not change (and stops), or fixes up the
// balance of the current node and moves on to its parent. Rotations never touch balances; the
// caller assigns them afterwards.

#[cfg(feature = "alloc")]
extern crate alloc;
#[cfg(any(test, feature = "std"))]
extern crate std;

use core::{
    borrow::Borrow, cell::UnsafeCell, cmp::Ordering, fmt, marker::PhantomPinned, mem, ops::Not,
    pin::Pin,
    ptr::{self, NonNull},
};

use cordyceps::Linked;

#[cfg(feature = "alloc")]
mod debug;
mod depth;
mod error;
mod iter;
#[cfg(feature = "alloc")]
mod map;

#[cfg(any(all(test, feature = "alloc"), feature = "model"))]
pub mod model;


pub use error::KeyError;
pub use iter::Iter;
#[cfg(feature = "alloc")]
pub use map::{AvlMap, MapIter};

pub trait TreeNode<L>: Linked<L> {
    type Key: Ord;

    fn key(&self) -> &Self::Key;
}

/// An intrusive AVL tree.
///
/// Every node carries a balance factor in its [`Links`], and the tree restores the AVL height
/// bound with rotations after each insertion and removal. Insertion performs at most one single
/// or double rotation; removal may rotate at every level on the way up to the root.
pub struct AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
    len: usize,
}

/// The links embedded in every node of an [`AvlTree`].
pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    Left = 0,
    Right = 1,
}

impl Dir {
    /// The balance change caused by growing the subtree on this side.
    #[inline]
    fn sign(self) -> i8 {
        match self {
            Dir::Left => -1,
            Dir::Right => 1,
        }
    }
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    balance: i8,
    _unpin: PhantomPinned,
}

type Link<T> = Option<NonNull<T>>;

// Node identity is the address alone; metadata of unsized nodes is ignored.
#[inline]
fn same_node<T: ?Sized>(a: NonNull<T>, b: NonNull<T>) -> bool {
    ptr::addr_eq(a.as_ptr(), b.as_ptr())
}

#[inline]
fn links_to<T: ?Sized>(link: Link<T>, node: NonNull<T>) -> bool {
    link.is_some_and(|linked| same_node(linked, node))
}

// Where a search for a key ended up.
enum Search<T: ?Sized> {
    Found(NonNull<T>),
    Vacant(InsertAs<T>),
}

enum InsertAs<T: ?Sized> {
    Root,
    Child { parent: NonNull<T>, dir: Dir },
}

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> AvlTree<T> {
        AvlTree { root: None, len: 0 }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns the number of nodes on the longest path from the root to a leaf.
    ///
    /// This follows the heavier child at every level, so it completes in _O(log(n))_ time.
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            height += 1;

            let links = unsafe { self.links(cur) };
            opt_cur = if links.balance() < 0 {
                links.left()
            } else {
                links.right().or(links.left())
            };
        }

        height
    }

    /// Checks every structural invariant of the tree, panicking on the first violation.
    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        let Some(root) = self.root else {
            assert_eq!(self.len, 0, "empty tree must have length 0");
            return;
        };

        unsafe {
            assert!(self.links(root).parent().is_none(), "root must not have a parent");

            let mut count = 0;
            self.assert_invariants_at(root, &mut count);
            assert_eq!(count, self.len, "length does not match node count");
        }

        let mut prev: Option<&T> = None;
        for node in self.iter() {
            if let Some(prev) = prev {
                assert!(prev.key() < node.key(), "keys out of order");
            }
            prev = Some(node);
        }
    }

    // Returns the height of the subtree rooted at `node`.
    unsafe fn assert_invariants_at(&self, node: NonNull<T>, count: &mut usize) -> usize {
        *count += 1;

        let mut heights = [0usize; 2];

        unsafe {
            for dir in [Dir::Left, Dir::Right] {
                if let Some(child) = self.links(node).child(dir) {
                    // Ensure child's parent link points to this node.
                    let parent = self
                        .links(child)
                        .parent()
                        .expect("child parent pointer not set");
                    assert!(same_node(node, parent), "child has a stale parent link");

                    heights[dir as usize] = self.assert_invariants_at(child, count);
                }
            }

            let balance = self.links(node).balance();
            let actual = heights[Dir::Right as usize] as isize - heights[Dir::Left as usize] as isize;

            assert!((-1..=1).contains(&balance), "node has balance {balance}");
            assert_eq!(balance as isize, actual, "node has a stale balance");
        }

        1 + heights[0].max(heights[1])
    }

    /// Returns `true` if the tree contains an element with the given key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find(key).is_some()
    }

    /// Returns a reference to the node corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.find(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns a pinned mutable reference to the node corresponding to `key`.
    ///
    /// The caller must not change the node's key in a way that alters its ordering.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<Pin<&mut T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut ptr = self.find(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_mut())) }
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        let first = unsafe { self.min_in_subtree(self.root?) };
        unsafe { Some(Pin::new_unchecked(first.as_ref())) }
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        let last = unsafe { self.max_in_subtree(self.root?) };
        unsafe { Some(Pin::new_unchecked(last.as_ref())) }
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        let first = unsafe { self.min_in_subtree(self.root?) };
        Some(unsafe { self.remove_at(first) })
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        let last = unsafe { self.max_in_subtree(self.root?) };
        Some(unsafe { self.remove_at(last) })
    }

    /// Returns an iterator over the elements of the tree, in ascending key order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Inserts an item into the tree.
    ///
    /// If the tree already contains an item with the same key, `item` takes its place (same
    /// position, same balance) and the previous item is returned. Otherwise, returns `None`.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, item: T::Handle) -> Option<T::Handle> {
        let ptr = T::into_ptr(item);

        unsafe {
            self.links_mut(ptr).clear();

            match self.search(ptr.as_ref().key()) {
                Search::Found(old) => Some(self.replace_node(old, ptr)),
                Search::Vacant(at) => {
                    self.insert_vacant(at, ptr);
                    None
                }
            }
        }
    }

    /// Removes the item with the given key from the tree, if present.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.find(key)?;
        Some(unsafe { self.remove_at(node) })
    }

    /// Removes an arbitrary node from the tree.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an element of `self`, and not any
    /// other tree.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        unsafe {
            // A node with two children trades places with its predecessor, which has no right
            // child. Afterwards `node` has at most one child and can be spliced out directly.
            if self.links(node).left().is_some() && self.links(node).right().is_some() {
                let pred = self
                    .predecessor(node)
                    .expect("node with a left child must have a predecessor");
                self.swap_nodes(node, pred);
            }

            let parent = self.links(node).parent();
            let side = parent.map(|p| self.which_child(p, node));

            self.unlink(node);
            self.len -= 1;

            if let (Some(parent), Some(side)) = (parent, side) {
                self.remove_fix(parent, side);
            }

            T::from_ptr(node)
        }
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root;

        // Repeatedly splice out the minimum of the remaining subtree. The minimum has no left
        // child, so the base unlink applies. Balances are not maintained.
        while let Some(cur) = opt_cur {
            unsafe {
                let min = self.min_in_subtree(cur);
                let parent = self.links(min).parent();
                let right = self.links(min).right();

                self.unlink(min);
                drop(T::from_ptr(min));
                self.len -= 1;

                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }

    // Base tree ==============================================================

    #[inline]
    unsafe fn links<'a>(&self, node: NonNull<T>) -> &'a Links<T> {
        unsafe { T::links(node).as_ref() }
    }

    #[inline]
    unsafe fn links_mut<'a>(&mut self, node: NonNull<T>) -> &'a mut Links<T> {
        unsafe { T::links(node).as_mut() }
    }

    fn find<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self.search(key) {
            Search::Found(node) => Some(node),
            Search::Vacant(_) => None,
        }
    }

    fn search<Q>(&self, key: &Q) -> Search<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let Some(mut cur) = self.root else {
            return Search::Vacant(InsertAs::Root);
        };

        loop {
            let dir = match key.cmp(unsafe { cur.as_ref().key().borrow() }) {
                Ordering::Less => Dir::Left,
                Ordering::Equal => return Search::Found(cur),
                Ordering::Greater => Dir::Right,
            };

            match unsafe { self.links(cur).child(dir) } {
                Some(child) => cur = child,
                None => return Search::Vacant(InsertAs::Child { parent: cur, dir }),
            }
        }
    }

    // Links the detached `node` into the vacant position `at`.
    //
    // Balances are not updated.
    unsafe fn insert_leaf(&mut self, at: &InsertAs<T>, node: NonNull<T>) {
        unsafe {
            debug_assert!(self.links(node).is_leaf());

            match *at {
                InsertAs::Root => {
                    debug_assert!(self.root.is_none());
                    self.links_mut(node).set_parent(None);
                    self.root = Some(node);
                }
                InsertAs::Child { parent, dir } => {
                    debug_assert!(self.links(parent).child(dir).is_none());
                    self.links_mut(node).set_parent(Some(parent));
                    self.links_mut(parent).set_child(dir, Some(node));
                }
            }
        }

        self.len += 1;
    }

    // Links the detached `node` into the vacant position `at` and restores the balances above it.
    unsafe fn insert_vacant(&mut self, at: InsertAs<T>, node: NonNull<T>) {
        unsafe {
            self.insert_leaf(&at, node);

            let InsertAs::Child { parent, dir } = at else {
                return;
            };

            // If `parent` was already leaning one way, the new leaf fills its short side and the
            // height of its subtree is unchanged.
            if self.links(parent).balance() != 0 {
                self.links_mut(parent).set_balance(0);
            } else {
                self.links_mut(parent).set_balance(dir.sign());
                self.insert_fix(parent, node);
            }
        }
    }

    // Removes `node`, which has at most one child, elevating the child into its place.
    //
    // Balances are not updated. The links of `node` are reset.
    unsafe fn unlink(&mut self, node: NonNull<T>) {
        unsafe {
            let links = self.links(node);
            debug_assert!(
                links.left().is_none() || links.right().is_none(),
                "unlinked node must have at most one child"
            );

            let parent = links.parent();
            let child = links.left().or(links.right());

            self.replace_child_or_set_root(parent, node, child);
            self.maybe_set_parent(child, parent);

            self.links_mut(node).clear();
        }
    }

    // Moves `new` into the exact position of `old`, which is then detached from the tree.
    unsafe fn replace_node(&mut self, old: NonNull<T>, new: NonNull<T>) -> T::Handle {
        unsafe {
            let old_links = self.links(old);
            let parent = old_links.parent();
            let left = old_links.left();
            let right = old_links.right();
            let balance = old_links.balance();

            self.replace_child_or_set_root(parent, old, Some(new));
            self.maybe_set_parent(left, Some(new));
            self.maybe_set_parent(right, Some(new));

            let new_links = self.links_mut(new);
            new_links.set_parent(parent);
            new_links.set_left(left);
            new_links.set_right(right);
            new_links.set_balance(balance);

            self.links_mut(old).clear();

            T::from_ptr(old)
        }
    }

    // Returns the in-order predecessor of `node`.
    unsafe fn predecessor(&self, node: NonNull<T>) -> Link<T> {
        unsafe { self.neighbor(node, Dir::Left) }
    }

    // Returns the in-order successor of `node`.
    unsafe fn successor(&self, node: NonNull<T>) -> Link<T> {
        unsafe { self.neighbor(node, Dir::Right) }
    }

    unsafe fn neighbor(&self, node: NonNull<T>, dir: Dir) -> Link<T> {
        unsafe {
            // The nearest neighbor below is the extreme node of the `dir` subtree.
            if let Some(child) = self.links(node).child(dir) {
                return Some(self.extreme_in_subtree(child, !dir));
            }

            // Otherwise ascend until arriving from the `!dir` side.
            let mut cur = node;
            while let Some(parent) = self.links(cur).parent() {
                if self.which_child(parent, cur) == !dir {
                    return Some(parent);
                }
                cur = parent;
            }

            None
        }
    }

    #[inline]
    unsafe fn min_in_subtree(&self, root: NonNull<T>) -> NonNull<T> {
        unsafe { self.extreme_in_subtree(root, Dir::Left) }
    }

    #[inline]
    unsafe fn max_in_subtree(&self, root: NonNull<T>) -> NonNull<T> {
        unsafe { self.extreme_in_subtree(root, Dir::Right) }
    }

    unsafe fn extreme_in_subtree(&self, root: NonNull<T>, dir: Dir) -> NonNull<T> {
        let mut cur = root;

        while let Some(next) = unsafe { self.links(cur).child(dir) } {
            cur = next;
        }

        cur
    }

    // Exchanges the positions of `a` and `b` in the tree. Each node keeps its key, but takes
    // over the parent and children of the other.
    //
    // Balances are not updated.
    unsafe fn swap_positions(&mut self, a: NonNull<T>, b: NonNull<T>) {
        if same_node(a, b) {
            return;
        }

        unsafe {
            // When `a` and `b` are adjacent, the link between them has to be flipped rather than
            // copied.
            let flip = |link: Link<T>| match link {
                Some(x) if same_node(x, a) => Some(b),
                Some(x) if same_node(x, b) => Some(a),
                other => other,
            };

            let a_parent = self.links(a).parent();
            let b_parent = self.links(b).parent();

            // Record slots before any link is rewritten; `a` and `b` may be siblings.
            let a_slot = a_parent.map(|p| (p, self.which_child(p, a)));
            let b_slot = b_parent.map(|p| (p, self.which_child(p, b)));

            let a_children = [self.links(a).left(), self.links(a).right()];
            let b_children = [self.links(b).left(), self.links(b).right()];

            self.links_mut(a).set_parent(flip(b_parent));
            self.links_mut(a).set_left(flip(b_children[0]));
            self.links_mut(a).set_right(flip(b_children[1]));

            self.links_mut(b).set_parent(flip(a_parent));
            self.links_mut(b).set_left(flip(a_children[0]));
            self.links_mut(b).set_right(flip(a_children[1]));

            match a_slot {
                Some((p, dir)) if !same_node(p, b) => {
                    self.links_mut(p).set_child(dir, Some(b));
                }
                Some(_) => {}
                None => self.root = Some(b),
            }

            match b_slot {
                Some((p, dir)) if !same_node(p, a) => {
                    self.links_mut(p).set_child(dir, Some(a));
                }
                Some(_) => {}
                None => self.root = Some(a),
            }

            for (node, children) in [(a, b_children), (b, a_children)] {
                for child in children.into_iter().flatten() {
                    if !same_node(child, a) && !same_node(child, b) {
                        self.links_mut(child).set_parent(Some(node));
                    }
                }
            }
        }
    }

    // Exchanges the positions of `a` and `b` along with their balances.
    //
    // The balance describes the shape of the subtree at a position, not the item stored there.
    unsafe fn swap_nodes(&mut self, a: NonNull<T>, b: NonNull<T>) {
        unsafe {
            self.swap_positions(a, b);

            let a_inner = self.links_mut(a).inner.get_mut();
            let b_inner = self.links_mut(b).inner.get_mut();
            mem::swap(&mut a_inner.balance, &mut b_inner.balance);
        }
    }

    unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { self.links_mut(node).set_parent(parent) };
    }

    #[inline]
    unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe { self.replace_child(parent, old_child, new_child) },
            None => self.root = new_child,
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // The caller must ensure that `old_child` is a child node of `parent`.
    unsafe fn replace_child(&mut self, parent: NonNull<T>, old_child: NonNull<T>, new_child: Link<T>) {
        unsafe {
            let dir = self.which_child(parent, old_child);
            debug_assert!(
                links_to(self.links(parent).child(dir), old_child),
                "`old_child` must be a child of `parent`"
            );
            self.links_mut(parent).set_child(dir, new_child);
        }
    }

    #[inline]
    unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        if links_to(unsafe { self.links(parent).left() }, child) {
            Dir::Left
        } else {
            Dir::Right
        }
    }

    // Rotations ==============================================================

    // Rotates `down` towards `dir`; its child on the opposite side takes its place.
    //
    // Balances of affected nodes are not updated. Returns the node that moved up.
    fn rotate(&mut self, down: NonNull<T>, dir: Dir) -> NonNull<T> {
        unsafe {
            let up = self
                .links(down)
                .child(!dir)
                .expect("rotation requires a child on the rising side");

            // `across` goes from the `dir` child of `up` to the `!dir` child of `down`.
            let across = self.links(up).child(dir);
            self.links_mut(down).set_child(!dir, across);
            self.maybe_set_parent(across, Some(down));

            let parent = self.links(down).parent();
            self.replace_child_or_set_root(parent, down, Some(up));
            self.links_mut(up).set_parent(parent);

            self.links_mut(up).set_child(dir, Some(down));
            self.links_mut(down).set_parent(Some(up));

            up
        }
    }

    // Returns `true` if `p` hangs off `g` on the same side as `n` hangs off `p`.
    unsafe fn is_zig_zig(&self, g: NonNull<T>, p: NonNull<T>, n: NonNull<T>) -> bool {
        unsafe { self.which_child(g, p) == self.which_child(p, n) }
    }

    // Rebalancing ============================================================

    // Performs a bottom-up rebalance of the tree after the insertion of a leaf.
    //
    // Invariants:
    // - The subtree rooted at `parent` grew by one level, and `b(parent)` already accounts for it.
    // - `node` is a child of `parent` lying on the side that grew.
    fn insert_fix(&mut self, parent: NonNull<T>, node: NonNull<T>) {
        let (mut p, mut n) = (parent, node);

        unsafe {
            while let Some(g) = self.links(p).parent() {
                let dir = self.which_child(g, p);
                let balance = self.links(g).balance() + dir.sign();
                self.links_mut(g).set_balance(balance);

                match balance {
                    // The short side of `g` caught up; its height is unchanged.
                    0 => return,

                    // `g` grew by one level as well. Ascend.
                    -1 | 1 => {
                        (p, n) = (g, p);
                    }

                    _ => {
                        if self.is_zig_zig(g, p, n) {
                            self.rotate(g, !dir);
                            self.links_mut(p).set_balance(0);
                            self.links_mut(g).set_balance(0);
                        } else {
                            let n_balance = self.links(n).balance();

                            self.rotate(p, dir);
                            self.rotate(g, !dir);

                            // `p` keeps the outer subtree of `n`, `g` the inner one.
                            let (p_balance, g_balance) = match n_balance {
                                0 => (0, 0),
                                b if b == dir.sign() => (0, -dir.sign()),
                                _ => (dir.sign(), 0),
                            };

                            self.links_mut(p).set_balance(p_balance);
                            self.links_mut(g).set_balance(g_balance);
                            self.links_mut(n).set_balance(0);
                        }

                        // A rotation restores the height the subtree had before the insertion.
                        return;
                    }
                }
            }
        }
    }

    // Performs a bottom-up rebalance of the tree after the subtree on the `shrunk` side of `node`
    // lost one level of height.
    fn remove_fix(&mut self, node: NonNull<T>, shrunk: Dir) {
        let (mut n, mut shrunk) = (node, shrunk);

        unsafe {
            loop {
                // Where to continue if the height of `n`'s subtree drops. This must be read before
                // any rotation at `n`.
                let next = self
                    .links(n)
                    .parent()
                    .map(|p| (p, self.which_child(p, n)));

                let heavy = !shrunk;
                let balance = self.links(n).balance() + heavy.sign();

                match balance {
                    -2 | 2 => {
                        let c = self
                            .links(n)
                            .child(heavy)
                            .expect("heavy side of an unbalanced node must be present");
                        let c_balance = self.links(c).balance();

                        if c_balance == heavy.sign() {
                            // Zig-zig; the rotation leaves the subtree one level shorter.
                            self.rotate(n, shrunk);
                            self.links_mut(n).set_balance(0);
                            self.links_mut(c).set_balance(0);
                        } else if c_balance == 0 {
                            // Zig-zig with a flat child; the subtree keeps its height.
                            self.rotate(n, shrunk);
                            self.links_mut(n).set_balance(heavy.sign());
                            self.links_mut(c).set_balance(-heavy.sign());
                            return;
                        } else {
                            // Zig-zag.
                            let g = self
                                .links(c)
                                .child(shrunk)
                                .expect("inner child of a zig-zag must be present");
                            let g_balance = self.links(g).balance();

                            self.rotate(c, heavy);
                            self.rotate(n, shrunk);

                            let (n_balance, c_balance) = match g_balance {
                                0 => (0, 0),
                                b if b == heavy.sign() => (-heavy.sign(), 0),
                                _ => (0, heavy.sign()),
                            };

                            self.links_mut(n).set_balance(n_balance);
                            self.links_mut(c).set_balance(c_balance);
                            self.links_mut(g).set_balance(0);
                        }
                    }

                    // The removal is absorbed by `n`'s taller side.
                    -1 | 1 => {
                        self.links_mut(n).set_balance(balance);
                        return;
                    }

                    _ => self.links_mut(n).set_balance(0),
                }

                match next {
                    Some((p, dir)) => {
                        (n, shrunk) = (p, dir);
                    }
                    None => return,
                }
            }
        }
    }
}

impl<T> Default for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Key: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|node| node.key())).finish()
    }
}

impl<T> Drop for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                balance: 0,
                _unpin: PhantomPinned,
            }),
        }
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.left().is_none() && self.right().is_none()
    }

    #[inline]
    fn balance(&self) -> i8 {
        unsafe { (*self.inner.get()).balance }
    }

    #[inline]
    fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    fn set_left(&mut self, left: Link<T>) -> Link<T> {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    fn set_right(&mut self, right: Link<T>) -> Link<T> {
        self.set_child(Dir::Right, right)
    }

    #[inline]
    fn set_balance(&mut self, balance: i8) {
        debug_assert!((-2..=2).contains(&balance), "balance {balance} out of range");
        self.inner.get_mut().balance = balance;
    }

    // Detaches the links from any tree.
    #[inline]
    fn clear(&mut self) {
        let inner = self.inner.get_mut();
        inner.parent = None;
        inner.children = [None; 2];
        inner.balance = 0;
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .field("balance", &self.balance())
            .finish()
    }
}
