//! Document hierarchy assembly.
//!
//! The storage layer hands over a flat, depth-then-id ordered list of
//! [`DocumentRecord`]s. [`build_forest`] links them into [`DocumentNode`]
//! trees by parent reference; [`build_tree`] picks out the subtree rooted at
//! one id.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use log::warn;

use crate::error::{Error, Result};

// ============================================================================
// Public Types
// ============================================================================

/// One document as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct DocumentRecord {
    pub id: i64,
    /// Container file holding the document.
    pub content_path: PathBuf,
    #[cfg_attr(feature = "serde", serde(default))]
    pub parent_id: Option<i64>,
    /// Id of the document that replaces this one.
    #[cfg_attr(feature = "serde", serde(default))]
    pub superseded_by_id: Option<i64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub level: u32,
}

impl DocumentRecord {
    pub fn new(id: i64, content_path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            content_path: content_path.into(),
            parent_id: None,
            superseded_by_id: None,
            level: 0,
        }
    }

    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_superseded_by(mut self, id: i64) -> Self {
        self.superseded_by_id = Some(id);
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }
}

/// A document together with the documents spliced into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentNode {
    pub id: i64,
    pub content_path: PathBuf,
    pub parent_id: Option<i64>,
    pub superseded_by_id: Option<i64>,
    pub level: u32,
    /// Children in merge order.
    pub children: Vec<DocumentNode>,
}

impl DocumentNode {
    pub fn new(id: i64, content_path: impl Into<PathBuf>) -> Self {
        Self::from_record(&DocumentRecord::new(id, content_path))
    }

    fn from_record(record: &DocumentRecord) -> Self {
        Self {
            id: record.id,
            content_path: record.content_path.clone(),
            parent_id: record.parent_id,
            superseded_by_id: record.superseded_by_id,
            level: record.level,
            children: Vec::new(),
        }
    }

    /// Append a child, linking its parent reference to this node.
    pub fn with_child(mut self, mut child: DocumentNode) -> Self {
        child.parent_id = Some(self.id);
        self.children.push(child);
        self
    }

    pub fn with_superseded_by(mut self, id: i64) -> Self {
        self.superseded_by_id = Some(id);
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes in this subtree, including this one.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(&node.children);
        }
        count
    }

    /// Detach the subtree rooted at `id`.
    fn into_subtree(self, id: i64) -> Option<DocumentNode> {
        let mut stack = vec![self];
        while let Some(mut node) = stack.pop() {
            if node.id == id {
                return Some(node);
            }
            stack.append(&mut node.children);
        }
        None
    }
}

impl Drop for DocumentNode {
    // Chains can be far deeper than the call stack.
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

// ============================================================================
// Building
// ============================================================================

/// Link records into trees.
///
/// A record whose parent is not in the input becomes an extra root. Children
/// keep input order. When an id appears twice the first record wins. Records
/// that are their own ancestor cannot hang off any root and are reported as
/// [`Error::Cycle`].
pub fn build_forest(records: &[DocumentRecord]) -> Result<Vec<DocumentNode>> {
    let mut index: HashMap<i64, usize> = HashMap::with_capacity(records.len());
    let mut unique: Vec<&DocumentRecord> = Vec::with_capacity(records.len());
    for record in records {
        if index.contains_key(&record.id) {
            warn!("duplicate document record {}; keeping the first", record.id);
            continue;
        }
        index.insert(record.id, unique.len());
        unique.push(record);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); unique.len()];
    let mut roots = Vec::new();
    for (i, record) in unique.iter().enumerate() {
        match record.parent_id.and_then(|p| index.get(&p)) {
            Some(&parent) => children[parent].push(i),
            None => roots.push(i),
        }
    }

    // Pre-order from every root; a node is reachable at most once because it
    // has a single parent.
    let mut order = Vec::with_capacity(unique.len());
    let mut seen = HashSet::with_capacity(unique.len());
    let mut stack: Vec<usize> = roots.iter().rev().copied().collect();
    while let Some(i) = stack.pop() {
        if !seen.insert(i) {
            continue;
        }
        order.push(i);
        stack.extend(children[i].iter().rev().copied());
    }

    if let Some(stray) = (0..unique.len()).find(|i| !seen.contains(i)) {
        let id = unique[stray].id;
        warn!("document {id} is its own ancestor");
        return Err(Error::Cycle(id));
    }

    let mut built: Vec<Option<DocumentNode>> = vec![None; unique.len()];
    for &i in order.iter().rev() {
        let mut node = DocumentNode::from_record(unique[i]);
        node.children = children[i].iter().filter_map(|&c| built[c].take()).collect();
        built[i] = Some(node);
    }

    Ok(roots.into_iter().filter_map(|r| built[r].take()).collect())
}

/// Build the tree rooted at `root_id`.
pub fn build_tree(records: &[DocumentRecord], root_id: i64) -> Result<DocumentNode> {
    build_forest(records)?
        .into_iter()
        .find_map(|tree| tree.into_subtree(root_id))
        .ok_or(Error::RootNotFound(root_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(id: i64, parent: Option<i64>) -> DocumentRecord {
        let record = DocumentRecord::new(id, format!("/docs/{id}.docx"));
        match parent {
            Some(p) => record.with_parent(p),
            None => record,
        }
    }

    fn ids(nodes: &[DocumentNode]) -> Vec<i64> {
        nodes.iter().map(|n| n.id).collect()
    }

    #[test]
    fn test_children_in_input_order_and_orphan_root() {
        let records = [
            record(1, None),
            record(2, Some(1)),
            record(3, Some(1)),
            record(4, Some(99)),
        ];

        let root = build_tree(&records, 1).unwrap();
        assert_eq!(ids(&root.children), vec![2, 3]);
        assert!(root.children.iter().all(DocumentNode::is_leaf));

        let forest = build_forest(&records).unwrap();
        assert_eq!(ids(&forest), vec![1, 4]);
        assert_eq!(forest[1].parent_id, Some(99));
    }

    #[test]
    fn test_subtree_below_the_top() {
        let records = [
            record(1, None),
            record(2, Some(1)),
            record(5, Some(2)),
            record(6, Some(2)),
        ];
        let node = build_tree(&records, 2).unwrap();
        assert_eq!(node.parent_id, Some(1));
        assert_eq!(ids(&node.children), vec![5, 6]);
        assert_eq!(node.node_count(), 3);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let records = [record(1, None)];
        assert!(matches!(build_tree(&records, 7), Err(Error::RootNotFound(7))));
    }

    #[test]
    fn test_cycle_is_rejected() {
        let records = [record(1, None), record(2, Some(3)), record(3, Some(2))];
        assert!(matches!(build_forest(&records), Err(Error::Cycle(2))));

        let self_parent = [record(8, Some(8))];
        assert!(matches!(build_tree(&self_parent, 8), Err(Error::Cycle(8))));
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let mut second = record(2, Some(1));
        second.content_path = PathBuf::from("/docs/other.docx");
        let records = [record(1, None), record(2, Some(1)), second];

        let root = build_tree(&records, 1).unwrap();
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].content_path, PathBuf::from("/docs/2.docx"));
    }

    #[test]
    fn test_node_builders() {
        let node = DocumentNode::new(1, "a.docx")
            .with_child(DocumentNode::new(2, "b.docx"))
            .with_superseded_by(9);
        assert_eq!(node.children[0].parent_id, Some(1));
        assert_eq!(node.superseded_by_id, Some(9));
        assert!(!node.is_leaf());
    }

    #[test]
    fn test_deep_chain_builds_and_drops() {
        let depth = 100_000;
        let records: Vec<_> = (0..depth)
            .map(|i| record(i, (i > 0).then(|| i - 1)))
            .collect();

        let root = build_tree(&records, 0).unwrap();
        assert_eq!(root.node_count(), depth as usize);
        drop(root);

        let middle = build_tree(&records, depth / 2).unwrap();
        assert_eq!(middle.parent_id, Some(depth / 2 - 1));
    }

    proptest! {
        #[test]
        fn prop_every_record_lands_under_its_parent(parents in prop::collection::vec(any::<prop::sample::Index>(), 1..40)) {
            // Record i points at some earlier record, or none for i == 0.
            let records: Vec<_> = parents
                .iter()
                .enumerate()
                .map(|(i, pick)| {
                    let parent = (i > 0).then(|| pick.index(i) as i64);
                    record(i as i64, parent)
                })
                .collect();

            let forest = build_forest(&records).unwrap();
            prop_assert_eq!(ids(&forest), vec![0]);
            prop_assert_eq!(forest[0].node_count(), records.len());

            let mut stack: Vec<&DocumentNode> = forest.iter().collect();
            while let Some(node) = stack.pop() {
                for child in &node.children {
                    prop_assert_eq!(child.parent_id, Some(node.id));
                }
                let child_ids = ids(&node.children);
                let mut sorted = child_ids.clone();
                sorted.sort_unstable();
                prop_assert_eq!(child_ids, sorted);
                stack.extend(&node.children);
            }
        }
    }
}
