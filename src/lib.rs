//! An intrusive AVL tree.
//#![no_std]

// Conventions used in comments:
// - The height of a subtree rooted at `x` is denoted `h(x)`; an empty subtree has height 0.
// - The balance factor of a node `x` is `b(x) = h(right(x)) - h(left(x))`.
// - A node is `d`-heavy if its balance factor has the sign of side `d` (left is negative).
//
// The fundamental invariant of an AVL tree is that `b(x) ∈ {-1, 0, 1}` for every node `x`.
//
// Balance factors are maintained incrementally. During a fix-up pass at most one node is allowed to
// reach ±2, and that node is restored with one or two rotations before the pass continues.
//
// Corollaries:
// 1. A node with balance factor ±1 has at least one child on its heavy side.
// 2. A node with only one child has that child as a leaf, and balance factor ±1.
// 3. Inserting a second child under a unary node never changes that node's height.

use core::{
    borrow::Borrow, cell::UnsafeCell, cmp::Ordering, fmt, marker::PhantomPinned, mem, ops::Not,
    pin::Pin, ptr::NonNull,
};

use cordyceps::Linked;

mod cursor;
mod debug;
pub mod entry;
mod iter;
pub mod map;
#[cfg(any(test, feature = "model"))]
pub mod model;
mod paths;
mod validate;

#[cfg(test)]
mod tests;

pub use cursor::{Cursor, CursorMut};
pub use entry::{Entry, OccupiedEntry, VacantEntry};
pub use iter::Iter;
pub use map::AvlMap;
pub use validate::InvariantError;

use entry::InsertAs;

pub trait TreeNode<L>: Linked<L> {
    type Key: Ord + fmt::Debug;

    fn key(&self) -> &Self::Key;
}

/// An intrusive AVL tree.
///
/// Items are linked through their embedded [`Links`] and owned by the tree through their
/// [`Linked::Handle`] until they are removed.
///
/// [Linked::Handle]: cordyceps::Linked::Handle
pub struct AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
    len: usize,
}

/// The links embedded in every item of an [`AvlTree`].
pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Dir {
    Left = 0,
    Right = 1,
}

impl Dir {
    // The sign a deeper subtree on this side contributes to its parent's balance factor.
    #[inline]
    const fn balance(self) -> i8 {
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

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        if let Err(error) = self.validate() {
            panic!("AVL invariant violated: {error}");
        }
    }

    /// Returns a reference to the item corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns a pinned mutable reference to the item corresponding to `key`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that neither the links nor the key of the returned item are
    /// modified.
    pub unsafe fn get_mut<Q>(&mut self, key: &Q) -> Option<Pin<&mut T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_mut())) }
    }

    /// Returns `true` if the tree contains an item with the given key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    fn get_raw<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.search(key).ok()
    }

    // Descends the tree looking for `key`.
    //
    // Returns the matching node, or the position at which a node with `key` would be linked.
    pub(crate) fn search<Q>(&self, key: &Q) -> Result<NonNull<T>, InsertAs<T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let Some(mut cur) = self.root else {
            return Err(InsertAs::Root);
        };

        loop {
            let dir = match key.cmp(unsafe { cur.as_ref() }.key().borrow()) {
                Ordering::Less => Dir::Left,
                Ordering::Equal => return Ok(cur),
                Ordering::Greater => Dir::Right,
            };

            match unsafe { self.links(cur).child(dir) } {
                Some(child) => cur = child,
                None => return Err(InsertAs::Child { parent: cur, dir }),
            }
        }
    }

    /// Returns a view into the entry for `key`, which may be vacant or occupied.
    pub fn entry<'tree, 'key, Q>(&'tree mut self, key: &'key Q) -> Entry<'tree, 'key, T, Q>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self.search(key) {
            Ok(node) => unsafe { Entry::occupied(self, node) },
            Err(insert_as) => unsafe { Entry::vacant(self, key, insert_as) },
        }
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        self.first_raw()
            .map(|first| unsafe { Pin::new_unchecked(first.as_ref()) })
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        self.last_raw()
            .map(|last| unsafe { Pin::new_unchecked(last.as_ref()) })
    }

    pub(crate) fn first_raw(&self) -> Link<T> {
        self.root
            .map(|root| unsafe { self.extreme_in_subtree(root, Dir::Left) })
    }

    pub(crate) fn last_raw(&self) -> Link<T> {
        self.root
            .map(|root| unsafe { self.extreme_in_subtree(root, Dir::Right) })
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        let first = self.first_raw()?;
        unsafe { Some(self.remove_at(first)) }
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        let last = self.last_raw()?;
        unsafe { Some(self.remove_at(last)) }
    }

    /// Returns an iterator over the elements of the tree in ascending key order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Returns a cursor pointing at the minimum element of the tree.
    pub fn cursor_first(&self) -> Cursor<'_, T> {
        Cursor::first(self)
    }

    /// Returns a cursor pointing at the maximum element of the tree.
    pub fn cursor_last(&self) -> Cursor<'_, T> {
        Cursor::last(self)
    }

    /// Returns an editing cursor pointing at the minimum element of the tree.
    pub fn cursor_first_mut(&mut self) -> CursorMut<'_, T> {
        CursorMut::first(self)
    }

    /// Returns an editing cursor pointing at the maximum element of the tree.
    pub fn cursor_last_mut(&mut self) -> CursorMut<'_, T> {
        CursorMut::last(self)
    }

    #[inline]
    unsafe fn links<'a>(&self, node: NonNull<T>) -> &'a Links<T> {
        unsafe { T::links(node).as_ref() }
    }

    #[inline]
    unsafe fn links_mut<'a>(&mut self, node: NonNull<T>) -> &'a mut Links<T> {
        unsafe { T::links(node).as_mut() }
    }

    #[inline]
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
    // The caller must ensure that the following conditions hold:
    // - `old_child` is a child node of `parent`.
    // - `new_child` is not a child node of `parent`.
    unsafe fn replace_child(
        &mut self,
        parent: NonNull<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        unsafe {
            let dir = self.which_child(parent, old_child);

            debug_assert!(
                new_child.is_none() || self.links(parent).child(!dir) != new_child,
                "`new_child` must not be a child of `parent`"
            );

            self.links_mut(parent).set_child(dir, new_child);
        }
    }

    // Rotates `node` down towards `dir`, lifting its `!dir` child into its place.
    //
    // `rotate(node, Dir::Right)` is a right rotation and `rotate(node, Dir::Left)` a left one. The
    // child's `dir` subtree moves across to become the `!dir` subtree of `node`.
    //
    // Balance factors are not updated.
    unsafe fn rotate(&mut self, node: NonNull<T>, dir: Dir) {
        unsafe {
            let child = self
                .links(node)
                .child(!dir)
                .expect("rotation requires a child opposite the rotation direction");
            let parent = self.links(node).parent();

            log::trace!(
                "rotating {:?} {:?}, lifting {:?}",
                node.as_ref().key(),
                dir,
                child.as_ref().key()
            );

            let across = self.links(child).child(dir);
            self.links_mut(node).set_child(!dir, across);
            self.maybe_set_parent(across, Some(node));

            self.links_mut(child).set_child(dir, Some(node));
            self.links_mut(node).set_parent(Some(child));

            self.links_mut(child).set_parent(parent);
            self.replace_child_or_set_root(parent, node, Some(child));
        }
    }

    /// Inserts an item into the tree.
    ///
    /// If the tree already contains an item with an equal key, `item` takes over that item's
    /// position and the old item is returned. The shape of the tree is unchanged in that case.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, item: T::Handle) -> Option<T::Handle> {
        let ptr = T::into_ptr(item);
        let position = self.search(unsafe { ptr.as_ref() }.key());

        unsafe {
            match position {
                Ok(existing) => Some(self.replace_at(existing, ptr)),
                Err(insert_as) => {
                    self.insert_at(insert_as, ptr);
                    None
                }
            }
        }
    }

    pub(crate) unsafe fn insert_at(&mut self, insert_as: InsertAs<T>, ptr: NonNull<T>) {
        unsafe {
            match insert_as {
                InsertAs::Root => self.insert_as_root(ptr),
                InsertAs::Child { parent, dir } => self.insert_as_child(parent, dir, ptr),
            }
        }
    }

    unsafe fn insert_as_root(&mut self, ptr: NonNull<T>) {
        debug_assert!(self.root.is_none());

        unsafe { self.links_mut(ptr).clear() };

        self.root = Some(ptr);
        self.len += 1;
    }

    unsafe fn insert_as_child(&mut self, parent: NonNull<T>, dir: Dir, ptr: NonNull<T>) {
        unsafe {
            debug_assert!(self.links(parent).child(dir).is_none());

            self.links_mut(ptr).clear();
            self.links_mut(ptr).set_parent(Some(parent));
            self.links_mut(parent).set_child(dir, Some(ptr));
            self.len += 1;

            // The parent was unary, and now has two leaves as children. Its height is unchanged.
            if self.links(parent).balance() != 0 {
                self.links_mut(parent).set_balance(0);
                return;
            }

            // The parent was a leaf and has grown by one level.
            self.links_mut(parent).set_balance(dir.balance());
            self.rebalance_inserted(parent, ptr);
        }
    }

    // Performs a bottom-up rebalance of the tree after the subtree rooted at `parent` has grown by
    // one level.
    //
    // Invariants:
    // - `node` is a child of `parent`, and `parent` is `node`-side heavy.
    // - The balance factors within `parent`'s subtree are up to date.
    unsafe fn rebalance_inserted(&mut self, mut parent: NonNull<T>, mut node: NonNull<T>) {
        unsafe {
            loop {
                let Some(grandparent) = self.links(parent).parent() else {
                    // The whole tree grew by one level.
                    return;
                };

                let dir = self.which_child(grandparent, parent);
                self.links_mut(grandparent).update_balance(dir.balance());

                match self.links(grandparent).balance() {
                    // The shorter side caught up. The height of `grandparent` is unchanged.
                    0 => {
                        log::trace!("insertion fix-up stopped at {:?}", grandparent.as_ref().key());
                        return;
                    }

                    // `grandparent` grew by one level; ascend.
                    -1 | 1 => {
                        node = parent;
                        parent = grandparent;
                    }

                    _ => {
                        if self.links(parent).balance() == dir.balance() {
                            // Zig-zig: `node` is the outer child of `parent`.
                            self.rotate(grandparent, !dir);

                            self.links_mut(grandparent).set_balance(0);
                            self.links_mut(parent).set_balance(0);
                        } else {
                            // Zig-zag: `node` is the inner child of `parent` and becomes the root
                            // of the subtree.
                            debug_assert_eq!(self.links(parent).child(!dir), Some(node));

                            let node_balance = self.links(node).balance();

                            self.rotate(parent, dir);
                            self.rotate(grandparent, !dir);

                            let (grandparent_balance, parent_balance) = if node_balance == 0 {
                                (0, 0)
                            } else if node_balance == dir.balance() {
                                (-dir.balance(), 0)
                            } else {
                                (0, dir.balance())
                            };

                            self.links_mut(grandparent).set_balance(grandparent_balance);
                            self.links_mut(parent).set_balance(parent_balance);
                            self.links_mut(node).set_balance(0);
                        }

                        // The rotated subtree has its pre-insertion height again.
                        log::trace!("insertion fix-up stopped after rotating {:?}", grandparent.as_ref().key());
                        return;
                    }
                }
            }
        }
    }

    // Replaces `old` with `new` in the tree, returning the handle of `old`.
    //
    // `new` takes over the links and balance factor of `old`; the caller must ensure that their keys
    // are equal.
    pub(crate) unsafe fn replace_at(&mut self, old: NonNull<T>, new: NonNull<T>) -> T::Handle {
        unsafe {
            let old_links = self.links(old);
            let parent = old_links.parent();
            let children = old_links.children();
            let balance = old_links.balance();

            self.replace_child_or_set_root(parent, old, Some(new));

            for child in children.into_iter().flatten() {
                self.links_mut(child).set_parent(Some(new));
            }

            let new_links = self.links_mut(new);
            new_links.set_parent(parent);
            new_links.set_child(Dir::Left, children[Dir::Left as usize]);
            new_links.set_child(Dir::Right, children[Dir::Right as usize]);
            new_links.set_balance(balance);

            self.links_mut(old).clear();

            T::from_ptr(old)
        }
    }

    /// Removes the item corresponding to `key` from the tree and returns it.
    ///
    /// Returns `None`, leaving the tree untouched, if no item has that key.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;
        unsafe { Some(self.remove_at(node)) }
    }

    /// Removes an arbitrary node from the tree.
    ///
    /// If `node` has two children it first trades places with its in-order predecessor, so that it
    /// can be unlinked with at most one child. Only positions are exchanged: the item returned is
    /// always `node`, and every other item stays where it is in memory.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an element of `self`, and not any
    /// other tree.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        unsafe {
            let links = self.links(node);
            if let (Some(left), Some(_)) = (links.left(), links.right()) {
                let predecessor = self.extreme_in_subtree(left, Dir::Right);
                self.swap_positions(node, predecessor);
            }

            // Removing a left child makes its parent one step more right-heavy, and vice versa.
            let parent = self.links(node).parent();
            let diff = parent
                .map(|parent| -self.which_child(parent, node).balance())
                .unwrap_or(0);

            self.detach(node);
            self.rebalance_removed(parent, diff);

            self.len -= 1;
            self.links_mut(node).clear();

            T::from_ptr(node)
        }
    }

    // Exchanges the positions of `a` and `b` in the tree, including their balance factors.
    //
    // `a` and `b` may be adjacent.
    unsafe fn swap_positions(&mut self, a: NonNull<T>, b: NonNull<T>) {
        let swap = |link: Link<T>| match link {
            Some(n) if n == a => Some(b),
            Some(n) if n == b => Some(a),
            other => other,
        };

        unsafe {
            let (a_parent, a_children, a_balance) = {
                let links = self.links(a);
                (links.parent(), links.children(), links.balance())
            };
            let (b_parent, b_children, b_balance) = {
                let links = self.links(b);
                (links.parent(), links.children(), links.balance())
            };

            // Repoint the parents. Siblings share a parent, which must only be visited once.
            let parents = if a_parent == b_parent {
                [a_parent, None]
            } else {
                [a_parent, b_parent]
            };
            for parent in parents.into_iter().flatten() {
                if parent == a || parent == b {
                    continue;
                }

                let links = self.links_mut(parent);
                for dir in [Dir::Left, Dir::Right] {
                    links.set_child(dir, swap(links.child(dir)));
                }
            }

            // Repoint the children.
            for child in a_children.into_iter().flatten().filter(|&c| c != b) {
                self.links_mut(child).set_parent(Some(b));
            }
            for child in b_children.into_iter().flatten().filter(|&c| c != a) {
                self.links_mut(child).set_parent(Some(a));
            }

            self.root = swap(self.root);

            let links = self.links_mut(a);
            links.set_parent(swap(b_parent));
            links.set_child(Dir::Left, swap(b_children[Dir::Left as usize]));
            links.set_child(Dir::Right, swap(b_children[Dir::Right as usize]));
            links.set_balance(b_balance);

            let links = self.links_mut(b);
            links.set_parent(swap(a_parent));
            links.set_child(Dir::Left, swap(a_children[Dir::Left as usize]));
            links.set_child(Dir::Right, swap(a_children[Dir::Right as usize]));
            links.set_balance(a_balance);
        }
    }

    // Unlinks `node`, which has at most one child, elevating that child into its place.
    //
    // Balance factors are not updated.
    unsafe fn detach(&mut self, node: NonNull<T>) {
        unsafe {
            let links = self.links(node);
            debug_assert!(
                links.left().is_none() || links.right().is_none(),
                "only nodes with at most one child can be detached"
            );

            let child = links.left().or(links.right());
            let parent = links.parent();

            self.replace_child_or_set_root(parent, node, child);
            self.maybe_set_parent(child, parent);
        }
    }

    // Performs a bottom-up rebalance of the tree after one of `opt_node`'s subtrees has shrunk by
    // one level.
    //
    // `diff` is +1 if the left subtree shrank and -1 if the right subtree shrank.
    unsafe fn rebalance_removed(&mut self, mut opt_node: Link<T>, mut diff: i8) {
        unsafe {
            while let Some(node) = opt_node {
                debug_assert!(diff == 1 || diff == -1);

                let parent = self.links(node).parent();
                let next_diff = parent
                    .map(|parent| -self.which_child(parent, node).balance())
                    .unwrap_or(0);

                let heavy = if diff > 0 { Dir::Right } else { Dir::Left };
                let balance = self.links(node).balance() + diff;

                match balance {
                    // The taller side shrank; `node` shrank with it.
                    0 => self.links_mut(node).set_balance(0),

                    // The subtrees were even; the height of `node` is unchanged.
                    -1 | 1 => {
                        self.links_mut(node).set_balance(balance);
                        log::trace!("removal fix-up stopped at {:?}", node.as_ref().key());
                        return;
                    }

                    _ => {
                        let child = self
                            .links(node)
                            .child(heavy)
                            .expect("the heavy side of an unbalanced node must not be empty");
                        let child_balance = self.links(child).balance();

                        if child_balance == heavy.balance() {
                            self.rotate(node, !heavy);

                            self.links_mut(node).set_balance(0);
                            self.links_mut(child).set_balance(0);
                        } else if child_balance == 0 {
                            self.rotate(node, !heavy);

                            // The subtree keeps its height, so nothing above changes.
                            self.links_mut(node).set_balance(heavy.balance());
                            self.links_mut(child).set_balance(-heavy.balance());
                            log::trace!("removal fix-up stopped at {:?}", child.as_ref().key());
                            return;
                        } else {
                            let grandchild = self
                                .links(child)
                                .child(!heavy)
                                .expect("a child leaning inwards must have an inner child");
                            let grandchild_balance = self.links(grandchild).balance();

                            self.rotate(child, heavy);
                            self.rotate(node, !heavy);

                            let (node_balance, child_balance) = if grandchild_balance == 0 {
                                (0, 0)
                            } else if grandchild_balance == heavy.balance() {
                                (-heavy.balance(), 0)
                            } else {
                                (0, heavy.balance())
                            };

                            self.links_mut(node).set_balance(node_balance);
                            self.links_mut(child).set_balance(child_balance);
                            self.links_mut(grandchild).set_balance(0);
                        }
                    }
                }

                opt_node = parent;
                diff = next_diff;
            }
        }
    }

    // Returns the node furthest towards `dir` in the subtree rooted at `root`.
    #[inline]
    unsafe fn extreme_in_subtree(&self, root: NonNull<T>, dir: Dir) -> NonNull<T> {
        let mut cur = root;

        while let Some(next) = unsafe { self.links(cur).child(dir) } {
            cur = next;
        }

        cur
    }

    // Returns the in-order neighbour of `node` on side `dir`.
    unsafe fn neighbor_raw(&self, node: NonNull<T>, dir: Dir) -> Link<T> {
        unsafe {
            if let Some(child) = self.links(node).child(dir) {
                return Some(self.extreme_in_subtree(child, !dir));
            }

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

    pub(crate) unsafe fn predecessor_raw(&self, node: NonNull<T>) -> Link<T> {
        unsafe { self.neighbor_raw(node, Dir::Left) }
    }

    pub(crate) unsafe fn successor_raw(&self, node: NonNull<T>) -> Link<T> {
        unsafe { self.neighbor_raw(node, Dir::Right) }
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let cur = self.extreme_in_subtree(cur, Dir::Left);
                let parent = self.links(cur).parent();
                let right = self.links(cur).right();

                // Elevate the node's right child (which may be None).
                self.replace_child_or_set_root(parent, cur, right);
                self.maybe_set_parent(right, parent);

                // Drop the node.
                self.links_mut(cur).clear();
                drop(T::from_ptr(cur));
                self.len -= 1;

                // If the node had no right child, climb to the parent. If the node had no parent,
                // the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }

    pub(crate) unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        unsafe {
            if self.links(parent).left() == Some(child) {
                Dir::Left
            } else {
                debug_assert_eq!(self.links(parent).right(), Some(child));
                Dir::Right
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
    fn children(&self) -> [Link<T>; 2] {
        unsafe { (*self.inner.get()).children }
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
    fn set_balance(&mut self, balance: i8) {
        debug_assert!((-1..=1).contains(&balance));
        self.inner.get_mut().balance = balance;
    }

    #[inline]
    fn update_balance(&mut self, diff: i8) {
        let inner = self.inner.get_mut();
        inner.balance = inner.balance.checked_add(diff).expect("balance factor overflow");
    }

    // Resets the links to their unlinked state.
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
