//! Report-to-tree aggregation for review.
//!
//! Nodes live in one arena and refer to each other by index. Expand state is
//! not stored here; callers pass the set of expanded node paths to
//! [`flatten_tree`].

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path};

use crate::core::{Category, RiskLevel, ScanItem};
use crate::ui::format_bytes;

const INDENT: &str = "  ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    pub path: String,
    pub size_bytes: u64,
    pub is_item: bool,
    pub category: Option<Category>,
    pub risk_level: Option<RiskLevel>,
    pub safe_to_delete: Option<bool>,
    pub app_installed: Option<bool>,
    pub matched_app_name: Option<String>,
    pub children: Vec<usize>,
}

impl TreeNode {
    fn aggregate(name: &str, path: String) -> Self {
        Self {
            name: name.to_string(),
            path,
            size_bytes: 0,
            is_item: false,
            category: None,
            risk_level: None,
            safe_to_delete: None,
            app_installed: None,
            matched_app_name: None,
            children: Vec::new(),
        }
    }

    pub fn is_orphaned(&self) -> bool {
        self.app_installed == Some(false)
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResultTree {
    pub base_path: String,
    nodes: Vec<TreeNode>,
    by_path: HashMap<String, usize>,
    roots: Vec<usize>,
}

impl ResultTree {
    pub fn find(&self, path: &str) -> Option<&TreeNode> {
        self.by_path.get(path).map(|&idx| &self.nodes[idx])
    }

    pub fn roots(&self) -> impl Iterator<Item = &TreeNode> {
        self.roots.iter().map(|&idx| &self.nodes[idx])
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.roots().map(|n| n.size_bytes).sum()
    }

    /// Paths of every node that has children.
    pub fn expandable_paths(&self) -> HashSet<String> {
        self.nodes
            .iter()
            .filter(|n| n.has_children())
            .map(|n| n.path.clone())
            .collect()
    }

    fn child_or_insert(&mut self, parent: Option<usize>, name: &str, path: String) -> usize {
        if let Some(&idx) = self.by_path.get(&path) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(TreeNode::aggregate(name, path.clone()));
        self.by_path.insert(path, idx);
        match parent {
            Some(p) => self.nodes[p].children.push(idx),
            None => self.roots.push(idx),
        }
        idx
    }
}

/// Segments of `path` below `base`, or of the whole path when it lies outside.
fn relative_segments(path: &Path, base: &Path) -> Vec<String> {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) if !s.is_empty() => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect()
}

pub fn build_tree(items: &[ScanItem], base_path: &str) -> ResultTree {
    let base = Path::new(base_path);
    let mut tree = ResultTree {
        base_path: base_path.to_string(),
        ..ResultTree::default()
    };

    for item in items {
        let item_path = Path::new(&item.path);
        let segments = relative_segments(item_path, base);
        if segments.is_empty() {
            continue;
        }

        let origin = if item_path.starts_with(base) {
            base.to_path_buf()
        } else {
            Path::new("/").to_path_buf()
        };

        let mut parent = None;
        let mut node_path = origin;
        for segment in &segments {
            node_path.push(segment);
            let idx = tree.child_or_insert(parent, segment, node_path.display().to_string());
            let node = &mut tree.nodes[idx];
            node.size_bytes = node.size_bytes.saturating_add(item.size_bytes);
            if node.app_installed.is_none() {
                node.app_installed = item.app_installed;
                node.matched_app_name = item.matched_app_name.clone();
            }
            parent = Some(idx);
        }

        if let Some(idx) = parent {
            let node = &mut tree.nodes[idx];
            node.is_item = true;
            node.category = Some(item.category);
            node.risk_level = Some(item.risk_level);
            node.safe_to_delete = Some(item.safe_to_delete);
        }
    }

    tree
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatTreeNode {
    pub index: usize,
    pub name: String,
    pub path: String,
    pub depth: usize,
    pub indent: String,
    pub has_children: bool,
    pub expanded: bool,
    pub size_bytes: u64,
    pub size_label: String,
    pub is_item: bool,
    pub safe_to_delete: Option<bool>,
    pub risk_level: Option<RiskLevel>,
    pub orphaned: bool,
}

impl FlatTreeNode {
    /// `▾` expanded, `▸` collapsed, blank for leaves.
    pub fn affordance(&self) -> &'static str {
        match (self.has_children, self.expanded) {
            (false, _) => " ",
            (true, true) => "▾",
            (true, false) => "▸",
        }
    }
}

fn sorted_children(tree: &ResultTree, children: &[usize]) -> Vec<usize> {
    let mut sorted = children.to_vec();
    sorted.sort_by(|&a, &b| {
        let (a, b) = (&tree.nodes[a], &tree.nodes[b]);
        b.is_orphaned()
            .cmp(&a.is_orphaned())
            .then_with(|| b.size_bytes.cmp(&a.size_bytes))
            .then_with(|| a.name.cmp(&b.name))
    });
    sorted
}

pub fn flatten_tree(tree: &ResultTree, expanded: &HashSet<String>) -> Vec<FlatTreeNode> {
    let mut rows = Vec::new();
    let mut stack: Vec<(usize, usize)> = sorted_children(tree, &tree.roots)
        .into_iter()
        .rev()
        .map(|idx| (idx, 0))
        .collect();

    while let Some((idx, depth)) = stack.pop() {
        let node = &tree.nodes[idx];
        let is_expanded = node.has_children() && expanded.contains(&node.path);
        rows.push(FlatTreeNode {
            index: idx,
            name: node.name.clone(),
            path: node.path.clone(),
            depth,
            indent: INDENT.repeat(depth),
            has_children: node.has_children(),
            expanded: is_expanded,
            size_bytes: node.size_bytes,
            size_label: format_bytes(node.size_bytes),
            is_item: node.is_item,
            safe_to_delete: node.safe_to_delete,
            risk_level: node.risk_level,
            orphaned: node.is_orphaned(),
        });

        if is_expanded {
            for child in sorted_children(tree, &node.children).into_iter().rev() {
                stack.push((child, depth + 1));
            }
        }
    }

    rows
}
