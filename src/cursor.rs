use core::{marker::PhantomData, pin::Pin, ptr::NonNull};

use crate::{AvlTree, Dir, Link, Links, TreeNode};

/// A read-only cursor over an [`AvlTree`].
///
/// A cursor sits either on an element or on the "ghost" position, which lies past the maximum
/// element and before the minimum one. Stepping off either end of the tree lands on the ghost, and
/// stepping from the ghost wraps around.
pub struct Cursor<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    curs: CursorRaw<T>,
    phantom: PhantomData<&'tree AvlTree<T>>,
}

impl<'tree, T> Cursor<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) fn first(tree: &'tree AvlTree<T>) -> Cursor<'tree, T> {
        Cursor {
            curs: CursorRaw::at_end(tree.into(), Dir::Left),
            phantom: PhantomData,
        }
    }

    pub(crate) fn last(tree: &'tree AvlTree<T>) -> Cursor<'tree, T> {
        Cursor {
            curs: CursorRaw::at_end(tree.into(), Dir::Right),
            phantom: PhantomData,
        }
    }

    /// Moves to the in-order successor, or from the ghost to the minimum element.
    pub fn move_next(&mut self) {
        unsafe { self.curs.step(Dir::Right) }
    }

    /// Moves to the in-order predecessor, or from the ghost to the maximum element.
    pub fn move_prev(&mut self) {
        unsafe { self.curs.step(Dir::Left) }
    }

    /// Returns the current element, or `None` on the ghost.
    pub fn get(&self) -> Option<&'tree T> {
        self.curs.ptr.map(|p| unsafe { p.as_ref() })
    }

    /// Returns the element [`move_next`](Self::move_next) would land on.
    pub fn peek_next(&self) -> Option<&'tree T> {
        unsafe { self.curs.peek(Dir::Right).map(|p| p.as_ref()) }
    }

    /// Returns the element [`move_prev`](Self::move_prev) would land on.
    pub fn peek_prev(&self) -> Option<&'tree T> {
        unsafe { self.curs.peek(Dir::Left).map(|p| p.as_ref()) }
    }
}

/// A cursor over an [`AvlTree`] which can also remove elements.
///
/// See [`Cursor`] for how positions and the ghost work.
pub struct CursorMut<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    curs: CursorRaw<T>,
    phantom: PhantomData<&'tree mut AvlTree<T>>,
}

impl<'tree, T> CursorMut<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) fn first(tree: &'tree mut AvlTree<T>) -> CursorMut<'tree, T> {
        CursorMut {
            curs: CursorRaw::at_end(tree.into(), Dir::Left),
            phantom: PhantomData,
        }
    }

    pub(crate) fn last(tree: &'tree mut AvlTree<T>) -> CursorMut<'tree, T> {
        CursorMut {
            curs: CursorRaw::at_end(tree.into(), Dir::Right),
            phantom: PhantomData,
        }
    }

    /// Returns a read-only cursor at the same position.
    ///
    /// The `CursorMut` remains immutably borrowed for the lifetime of the returned `Cursor`.
    pub fn as_cursor(&self) -> Cursor<'_, T> {
        Cursor {
            curs: CursorRaw {
                tree: self.curs.tree,
                ptr: self.curs.ptr,
            },
            phantom: PhantomData,
        }
    }

    /// Moves to the in-order successor, or from the ghost to the minimum element.
    pub fn move_next(&mut self) {
        unsafe { self.curs.step(Dir::Right) }
    }

    /// Moves to the in-order predecessor, or from the ghost to the maximum element.
    pub fn move_prev(&mut self) {
        unsafe { self.curs.step(Dir::Left) }
    }

    /// Returns the current element, or `None` on the ghost.
    pub fn get(&self) -> Option<&T> {
        self.curs.ptr.map(|p| unsafe { p.as_ref() })
    }

    /// Returns a pinned mutable reference to the current element, or `None` on the ghost.
    ///
    /// # Safety
    ///
    /// The caller must ensure that modifications to the returned value do not violate the
    /// invariants of the tree. In particular, the result of comparisons between the key of the
    /// returned item and the keys of other items in the tree must not change.
    pub unsafe fn get_mut(&mut self) -> Option<Pin<&mut T>> {
        self.curs
            .ptr
            .map(|mut p| unsafe { Pin::new_unchecked(p.as_mut()) })
    }

    /// Returns the element [`move_next`](Self::move_next) would land on.
    pub fn peek_next(&self) -> Option<&T> {
        unsafe { self.curs.peek(Dir::Right).map(|p| p.as_ref()) }
    }

    /// Returns the element [`move_prev`](Self::move_prev) would land on.
    pub fn peek_prev(&self) -> Option<&T> {
        unsafe { self.curs.peek(Dir::Left).map(|p| p.as_ref()) }
    }

    /// Removes the current element, rebalancing the tree, and moves to its successor.
    ///
    /// On the ghost this returns `None` and changes nothing.
    pub fn remove_current(&mut self) -> Option<T::Handle> {
        unsafe { self.curs.remove_current(Dir::Right) }
    }

    /// Removes the current element, rebalancing the tree, and moves to its predecessor.
    ///
    /// On the ghost this returns `None` and changes nothing.
    pub fn remove_current_and_move_prev(&mut self) -> Option<T::Handle> {
        unsafe { self.curs.remove_current(Dir::Left) }
    }
}

struct CursorRaw<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    tree: NonNull<AvlTree<T>>,
    ptr: Link<T>,
}

impl<T> CursorRaw<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn at_end(tree: NonNull<AvlTree<T>>, end: Dir) -> CursorRaw<T> {
        let ptr = unsafe {
            match end {
                Dir::Left => tree.as_ref().first_raw(),
                Dir::Right => tree.as_ref().last_raw(),
            }
        };

        CursorRaw { tree, ptr }
    }

    // Returns the position one step towards `dir`, wrapping through the ghost.
    unsafe fn peek(&self, dir: Dir) -> Link<T> {
        let tree = unsafe { self.tree.as_ref() };

        match (self.ptr, dir) {
            (Some(p), Dir::Left) => unsafe { tree.predecessor_raw(p) },
            (Some(p), Dir::Right) => unsafe { tree.successor_raw(p) },
            (None, Dir::Left) => tree.last_raw(),
            (None, Dir::Right) => tree.first_raw(),
        }
    }

    unsafe fn step(&mut self, dir: Dir) {
        self.ptr = unsafe { self.peek(dir) };
    }

    // Removing a node never relocates any other node, so the neighbour found before the removal
    // is still the right position afterwards.
    unsafe fn remove_current(&mut self, then: Dir) -> Option<T::Handle> {
        let remove = self.ptr?;

        unsafe {
            self.step(then);
            Some(self.tree.as_mut().remove_at(remove))
        }
    }
}
