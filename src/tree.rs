//! Lazily populated mirror of the board's filesystem.
//!
//! Children of a directory are materialized only while it is expanded.
//! Collapsing drops them; the next expansion lists the directory again.

use std::fmt::Write as _;

use tracing::debug;

use crate::model::{DirEntry, EntryKind, FileIdentity};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    Collapsed,
    /// A listing is in flight. `had_listing` restores the previous children
    /// on failure when this was a re-listing of an expanded directory.
    Loading { had_listing: bool },
    Expanded,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    pub path: String,
    pub parent: String,
    pub kind: EntryKind,
    pub state: NodeState,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    fn directory_root(path: &str) -> Self {
        Self {
            name: String::new(),
            path: path.to_string(),
            parent: String::new(),
            kind: EntryKind::Directory,
            state: NodeState::Collapsed,
            children: Vec::new(),
        }
    }

    fn from_entry(parent: &str, entry: &DirEntry) -> Self {
        Self {
            name: entry.name.clone(),
            path: join_path(parent, &entry.name),
            parent: parent.to_string(),
            kind: entry.kind,
            state: NodeState::Collapsed,
            children: Vec::new(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    fn find(&self, path: &str) -> Option<&TreeNode> {
        if self.path == path {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(path))
    }

    fn find_mut(&mut self, path: &str) -> Option<&mut TreeNode> {
        if self.path == path {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(path))
    }

    fn count(&self) -> usize {
        self.children.iter().map(|c| 1 + c.count()).sum()
    }
}

/// Outcome of a click on a node. A click hits exactly one node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeClick {
    /// Directory went from collapsed to loading; list `path`.
    Expand { path: String },
    /// Directory collapsed; its descendants were dropped.
    Collapse { path: String },
    OpenFile(FileIdentity),
    Missing,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryTree {
    root: TreeNode,
}

impl Default for DirectoryTree {
    fn default() -> Self {
        Self::new("")
    }
}

impl DirectoryTree {
    pub fn new(root_path: &str) -> Self {
        Self {
            root: TreeNode::directory_root(root_path),
        }
    }

    pub fn reset(&mut self, root_path: &str) {
        self.root = TreeNode::directory_root(root_path);
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    pub fn root_path(&self) -> &str {
        &self.root.path
    }

    pub fn node(&self, path: &str) -> Option<&TreeNode> {
        self.root.find(path)
    }

    /// Materialized children of `path`; empty unless expanded.
    pub fn children(&self, path: &str) -> &[TreeNode] {
        match self.node(path) {
            Some(node) => &node.children,
            None => &[],
        }
    }

    /// Number of materialized nodes below the root.
    pub fn materialized_count(&self) -> usize {
        self.root.count()
    }

    /// Marks a directory as loading. Returns `false` for unknown paths and files.
    pub fn begin_listing(&mut self, path: &str) -> bool {
        let Some(node) = self.root.find_mut(path) else {
            return false;
        };
        if !node.is_dir() {
            return false;
        }
        let had_listing = matches!(node.state, NodeState::Expanded)
            || matches!(node.state, NodeState::Loading { had_listing: true });
        node.state = NodeState::Loading { had_listing };
        true
    }

    /// Replaces the listing of `path` wholesale. Listings for directories
    /// collapsed in the meantime are dropped.
    pub fn apply_listing(&mut self, path: &str, entries: &[DirEntry]) -> bool {
        let Some(node) = self.root.find_mut(path) else {
            debug!(path, "listing for unknown node dropped");
            return false;
        };
        if !node.is_dir() || node.state == NodeState::Collapsed {
            debug!(path, "listing for collapsed node dropped");
            return false;
        }
        node.children = entries
            .iter()
            .map(|entry| TreeNode::from_entry(&node.path, entry))
            .collect();
        node.state = NodeState::Expanded;
        true
    }

    /// A listing failed: a first expansion falls back to collapsed, a
    /// re-listing keeps what was shown before.
    pub fn fail_listing(&mut self, path: &str) {
        let Some(node) = self.root.find_mut(path) else {
            return;
        };
        if let NodeState::Loading { had_listing } = node.state {
            if had_listing {
                node.state = NodeState::Expanded;
            } else {
                node.state = NodeState::Collapsed;
                node.children.clear();
            }
        }
    }

    pub fn click(&mut self, path: &str) -> TreeClick {
        let Some(node) = self.root.find_mut(path) else {
            return TreeClick::Missing;
        };
        match (node.kind, node.state) {
            (EntryKind::File, _) => {
                TreeClick::OpenFile(FileIdentity::new(node.parent.clone(), node.name.clone()))
            }
            (EntryKind::Directory, NodeState::Collapsed) => {
                node.state = NodeState::Loading { had_listing: false };
                TreeClick::Expand {
                    path: node.path.clone(),
                }
            }
            (EntryKind::Directory, NodeState::Expanded | NodeState::Loading { .. }) => {
                node.state = NodeState::Collapsed;
                node.children.clear();
                TreeClick::Collapse {
                    path: node.path.clone(),
                }
            }
        }
    }

    /// Indented text outline of the materialized tree.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        write_outline(&mut out, &self.root.children, 0);
        out
    }
}

fn write_outline(out: &mut String, nodes: &[TreeNode], depth: usize) {
    for node in nodes {
        let marker = match (node.kind, node.state) {
            (EntryKind::File, _) => ' ',
            (EntryKind::Directory, NodeState::Collapsed) => '+',
            (EntryKind::Directory, NodeState::Loading { .. }) => '~',
            (EntryKind::Directory, NodeState::Expanded) => '-',
        };
        let suffix = if node.is_dir() { "/" } else { "" };
        let _ = writeln!(out, "{:indent$}{marker} {}{suffix}", "", node.name, indent = depth * 2);
        write_outline(out, &node.children, depth + 1);
    }
}

/// `parent + '/' + name`, without doubling a trailing slash.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}
