//! Navigation tree derived from the directory index.

use serde::Serialize;

use crate::DirectoryIndex;

/// One directory node of the navigation tree.
///
/// Purely a projection of the index: built on demand for presentation,
/// never stored or patched in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    /// Absolute vault path of this directory.
    pub path: String,
    /// Child directories, in listing order.
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Build the directory tree rooted at `root` from an index snapshot.
    ///
    /// Only `is_dir` entries are followed; files never appear in the tree.
    pub fn build(index: &DirectoryIndex, root: &str) -> Self {
        let children = index
            .lookup(root)
            .unwrap_or(&[])
            .iter()
            .filter(|entry| entry.is_dir)
            .map(|entry| Self::build(index, &entry.path))
            .collect();
        Self {
            path: root.to_string(),
            children,
        }
    }

    /// Flatten the tree into preorder.
    pub fn flatten(&self) -> Vec<&TreeNode> {
        let mut nodes = vec![self];
        for child in &self.children {
            nodes.extend(child.flatten());
        }
        nodes
    }
}
