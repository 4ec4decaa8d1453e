use core::ptr::NonNull;

use crate::{AvlTree, Dir, Links, TreeNode};

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns `true` if every leaf of the tree lies at the same depth.
    ///
    /// Nodes with a single child are not leaves; only the leaves below them are considered. An
    /// empty tree trivially satisfies the check.
    ///
    /// Unlike the balance factors, this looks at the actual shape of the tree, in a single
    /// post-order pass.
    pub fn leaves_at_equal_depth(&self) -> bool {
        match self.root {
            Some(root) => unsafe { self.leaf_depth(root).is_some() },
            None => true,
        }
    }

    // Returns the depth shared by all leaves of the subtree rooted at `node`, counting `node` as
    // depth 1, or `None` if two leaves lie at different depths.
    unsafe fn leaf_depth(&self, node: NonNull<T>) -> Option<usize> {
        let links = unsafe { self.links(node) };

        let depth = match (links.child(Dir::Left), links.child(Dir::Right)) {
            (None, None) => 0,
            (Some(child), None) | (None, Some(child)) => unsafe { self.leaf_depth(child)? },
            (Some(left), Some(right)) => {
                let left = unsafe { self.leaf_depth(left)? };
                let right = unsafe { self.leaf_depth(right)? };

                if left != right {
                    return None;
                }

                left
            }
        };

        Some(depth + 1)
    }
}
