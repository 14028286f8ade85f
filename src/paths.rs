use core::ptr::NonNull;

use crate::{AvlTree, Link, Links, TreeNode};

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns the number of nodes on the longest path from the root to a leaf.
    ///
    /// An empty tree has height 0.
    pub fn height(&self) -> usize {
        unsafe { self.height_at(self.root) }
    }

    unsafe fn height_at(&self, node: Link<T>) -> usize {
        let Some(node) = node else {
            return 0;
        };

        unsafe {
            let links = self.links(node);
            1 + self.height_at(links.left()).max(self.height_at(links.right()))
        }
    }

    /// Returns `true` if every path from the root to a leaf has the same length.
    ///
    /// A node with a single child only requires that child's subtree to have equal paths; the
    /// missing side does not count as a path.
    pub fn has_equal_paths(&self) -> bool {
        match self.root {
            Some(root) => unsafe { self.uniform_depth(root).is_some() },
            None => true,
        }
    }

    // Returns the common length of all root-to-leaf paths below `node`, if there is one.
    unsafe fn uniform_depth(&self, node: NonNull<T>) -> Option<usize> {
        let links = unsafe { self.links(node) };

        let depth = match (links.left(), links.right()) {
            (None, None) => 0,
            (Some(child), None) | (None, Some(child)) => unsafe { self.uniform_depth(child)? },
            (Some(left), Some(right)) => {
                let left = unsafe { self.uniform_depth(left)? };
                let right = unsafe { self.uniform_depth(right)? };
                (left == right).then_some(left)?
            }
        };

        Some(depth + 1)
    }
}
