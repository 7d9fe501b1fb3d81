//! Package relationships (`word/_rels/document.xml.rels`).

use crate::error::{Error, Result};
use crate::xml::{NodeId, XmlTree};

const RELATIONSHIPS: &str = "Relationships";
const RELATIONSHIP: &str = "Relationship";
const PACKAGE_RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Relationship table of a document part, mapping `r:id` values to targets.
#[derive(Debug, Clone)]
pub struct Relationships {
    tree: XmlTree,
    root: NodeId,
}

impl Relationships {
    pub fn parse(xml: &str) -> Result<Self> {
        if xml.trim().is_empty() {
            return Err(Error::Structure("relationships part is empty".into()));
        }
        let tree = XmlTree::parse(xml)?;
        let root = tree
            .root_element()
            .filter(|&r| tree.is_element(r, RELATIONSHIPS))
            .ok_or_else(|| Error::Structure("no Relationships root element".into()))?;
        Ok(Self { tree, root })
    }

    /// An empty table, used for child documents that ship no relationships.
    pub fn empty() -> Self {
        let mut tree = XmlTree::new();
        let root = tree.create_element(RELATIONSHIPS, &[("xmlns", PACKAGE_RELATIONSHIPS_NS)]);
        tree.append_root(root);
        Self { tree, root }
    }

    fn entries(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.tree
            .children(self.root)
            .iter()
            .copied()
            .filter(|&c| self.tree.is_element(c, RELATIONSHIP))
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.entries()
            .filter_map(|e| self.tree.attr(e, "Id"))
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    fn find(&self, id: &str) -> Option<NodeId> {
        self.entries().find(|&e| self.tree.attr(e, "Id") == Some(id))
    }

    /// Target of relationship `id`.
    pub fn target(&self, id: &str) -> Option<&str> {
        self.tree.attr(self.find(id)?, "Target")
    }

    /// Copy relationship `id` of `other` into this table under `new_id`.
    /// Returns `false` if `other` has no such relationship.
    pub fn copy_from(&mut self, other: &Relationships, id: &str, new_id: &str) -> bool {
        let Some(source) = other.find(id) else {
            return false;
        };
        let copy = self.tree.import(&other.tree, source);
        self.tree.set_attr(copy, "Id", new_id);
        self.tree.append_child(self.root, copy);
        true
    }

    pub fn to_xml(&self) -> String {
        self.tree.to_xml()
    }
}
