extern crate std;

use core::ptr::NonNull;
use std::{format, string::String};

use thiserror::Error;

use crate::{AvlTree, Dir, Links, TreeNode};

/// A violated [`AvlTree`] invariant, as reported by [`AvlTree::validate`].
///
/// Keys are rendered with their `Debug` representation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InvariantError {
    #[error("key {key} is out of order")]
    Unordered { key: String },

    #[error("root {key} has a parent link")]
    RootHasParent { key: String },

    #[error("child {child} does not link back to its parent {parent}")]
    ParentLink { parent: String, child: String },

    #[error("node {key} is unbalanced: its subtree heights differ by {actual}")]
    Unbalanced { key: String, actual: isize },

    #[error("node {key} stores balance factor {stored}, but its subtree heights differ by {actual}")]
    BalanceMismatch {
        key: String,
        stored: i8,
        actual: isize,
    },

    #[error("tree reports {reported} elements but {counted} are reachable")]
    LenMismatch { reported: usize, counted: usize },
}

struct Subtree {
    height: usize,
    count: usize,
}

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Checks every structural invariant of the tree.
    ///
    /// This walks the whole tree and recomputes subtree heights from scratch, so it runs in
    /// _O(n)_ time. It is meant for tests and debugging.
    pub fn validate(&self) -> Result<(), InvariantError> {
        let Some(root) = self.root else {
            return match self.len {
                0 => Ok(()),
                reported => Err(InvariantError::LenMismatch {
                    reported,
                    counted: 0,
                }),
            };
        };

        unsafe {
            if self.links(root).parent().is_some() {
                return Err(InvariantError::RootHasParent {
                    key: key_string(root),
                });
            }

            let Subtree { count, .. } = self.validate_at(root, None, None)?;
            if count != self.len {
                return Err(InvariantError::LenMismatch {
                    reported: self.len,
                    counted: count,
                });
            }
        }

        Ok(())
    }

    // Validates the subtree at `node`, whose keys must lie strictly between `lower` and `upper`.
    unsafe fn validate_at(
        &self,
        node: NonNull<T>,
        lower: Option<&T::Key>,
        upper: Option<&T::Key>,
    ) -> Result<Subtree, InvariantError> {
        unsafe {
            let key = node.as_ref().key();

            if lower.is_some_and(|lower| lower >= key) || upper.is_some_and(|upper| upper <= key) {
                return Err(InvariantError::Unordered {
                    key: key_string(node),
                });
            }

            let mut heights = [0; 2];
            let mut count = 1;

            for dir in [Dir::Left, Dir::Right] {
                let Some(child) = self.links(node).child(dir) else {
                    continue;
                };

                if self.links(child).parent() != Some(node) {
                    return Err(InvariantError::ParentLink {
                        parent: key_string(node),
                        child: key_string(child),
                    });
                }

                let (child_lower, child_upper) = match dir {
                    Dir::Left => (lower, Some(key)),
                    Dir::Right => (Some(key), upper),
                };

                let subtree = self.validate_at(child, child_lower, child_upper)?;
                heights[dir as usize] = subtree.height;
                count += subtree.count;
            }

            let [left, right] = heights;
            let actual = right as isize - left as isize;

            if actual.abs() > 1 {
                return Err(InvariantError::Unbalanced {
                    key: key_string(node),
                    actual,
                });
            }

            let stored = self.links(node).balance();
            if stored as isize != actual {
                return Err(InvariantError::BalanceMismatch {
                    key: key_string(node),
                    stored,
                    actual,
                });
            }

            Ok(Subtree {
                height: 1 + left.max(right),
                count,
            })
        }
    }
}

unsafe fn key_string<T>(node: NonNull<T>) -> String
where
    T: TreeNode<Links<T>> + ?Sized,
{
    format!("{:?}", unsafe { node.as_ref() }.key())
}
