//! Arena-based XML tree with lossless round-tripping.
//!
//! Package parts are rewritten surgically, so the tree keeps the raw source
//! text of every token it has not touched. Serializing an unmodified tree
//! reproduces the input byte for byte; only elements whose attributes or
//! children were edited are re-rendered.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesStart, Event};

use crate::error::Result;

/// Unique identifier for a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Node payload.
#[derive(Debug, Clone)]
pub enum NodeData {
    Element {
        /// Qualified name, e.g. `w:p`.
        name: String,
        /// Attributes with unescaped values, in source order.
        attrs: Vec<(String, String)>,
        /// Source text of the start tag, dropped once the attributes change.
        raw_open: Option<String>,
        /// Source text of the end tag.
        raw_close: Option<String>,
        /// Written as `<name/>` in the source.
        self_closing: bool,
    },
    /// Character data or an entity reference, kept escaped.
    Text(String),
    /// Comments, CDATA, processing instructions, declarations.
    Markup(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed XML document.
///
/// Detached nodes stay allocated until the tree is dropped; the tree is
/// short-lived (one merge request) so no compaction is attempted.
#[derive(Debug, Clone, Default)]
pub struct XmlTree {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl XmlTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse XML text into a tree.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut tree = Self::new();
        let mut stack: Vec<NodeId> = Vec::new();
        let mut last = 0usize;

        loop {
            let event = reader.read_event()?;
            let pos = reader.buffer_position() as usize;
            let raw = &xml[last..pos];
            last = pos;

            let id = match event {
                Event::Start(e) => {
                    let id = tree.alloc_parsed(&e, raw, false);
                    tree.attach(stack.last().copied(), id);
                    stack.push(id);
                    continue;
                }
                Event::Empty(e) => tree.alloc_parsed(&e, raw, true),
                Event::End(_) => {
                    if let Some(open) = stack.pop()
                        && let NodeData::Element { raw_close, .. } = &mut tree.nodes[open.index()].data
                    {
                        *raw_close = Some(raw.to_string());
                    }
                    continue;
                }
                Event::Text(_) | Event::GeneralRef(_) => tree.alloc(NodeData::Text(raw.to_string())),
                Event::Eof => break,
                _ => tree.alloc(NodeData::Markup(raw.to_string())),
            };
            tree.attach(stack.last().copied(), id);
        }

        Ok(tree)
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn alloc_parsed(&mut self, start: &BytesStart, raw: &str, self_closing: bool) -> NodeId {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let attrs = start
            .attributes()
            .flatten()
            .map(|attr| {
                let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                let value = String::from_utf8_lossy(&attr.value).into_owned();
                let value = unescape_lossy(&value).into_owned();
                (key, value)
            })
            .collect();

        self.alloc(NodeData::Element {
            name,
            attrs,
            raw_open: Some(raw.to_string()),
            raw_close: None,
            self_closing,
        })
    }

    fn attach(&mut self, parent: Option<NodeId>, id: NodeId) {
        match parent {
            Some(parent) => self.append_child(parent, id),
            None => self.roots.push(id),
        }
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Create a detached element.
    pub fn create_element(&mut self, name: &str, attrs: &[(&str, &str)]) -> NodeId {
        self.alloc(NodeData::Element {
            name: name.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            raw_open: None,
            raw_close: None,
            self_closing: true,
        })
    }

    /// Create a detached text node from unescaped text.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Text(escape(text).into_owned()))
    }

    /// Deep-copy a subtree of `other` into this arena. The copy is detached.
    pub fn import(&mut self, other: &XmlTree, id: NodeId) -> NodeId {
        let root = self.alloc(other.nodes[id.index()].data.clone());
        let mut stack = vec![(id, root)];
        while let Some((src, dst)) = stack.pop() {
            for &child in &other.nodes[src.index()].children {
                let copy = self.alloc(other.nodes[child.index()].data.clone());
                self.append_child(dst, copy);
                stack.push((child, copy));
            }
        }
        root
    }

    // ------------------------------------------------------------------
    // Structure edits
    // ------------------------------------------------------------------

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
    }

    /// Add a detached node at the top level, after the existing roots.
    pub fn append_root(&mut self, id: NodeId) {
        self.detach(id);
        self.roots.push(id);
    }

    /// Insert `child` at `index` among the children of `parent`.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        self.nodes[child.index()].parent = Some(parent);
        let children = &mut self.nodes[parent.index()].children;
        let index = index.min(children.len());
        children.insert(index, child);
    }

    /// Insert `node` directly after `sibling`. No-op when `sibling` is detached.
    pub fn insert_after(&mut self, sibling: NodeId, node: NodeId) {
        let Some(parent) = self.parent(sibling) else {
            return;
        };
        self.detach(node);
        let pos = self.nodes[parent.index()]
            .children
            .iter()
            .position(|&c| c == sibling)
            .map_or(0, |p| p + 1);
        self.nodes[node.index()].parent = Some(parent);
        self.nodes[parent.index()].children.insert(pos, node);
    }

    /// Remove a node from its parent (or from the top level).
    pub fn detach(&mut self, id: NodeId) {
        match self.nodes[id.index()].parent.take() {
            Some(parent) => self.nodes[parent.index()].children.retain(|&c| c != id),
            None => self.roots.retain(|&r| r != id),
        }
    }

    /// Replace the children of `id` wholesale.
    pub fn set_children(&mut self, id: NodeId, children: Vec<NodeId>) {
        for old in std::mem::take(&mut self.nodes[id.index()].children) {
            self.nodes[old.index()].parent = None;
        }
        for &child in &children {
            self.detach(child);
            self.nodes[child.index()].parent = Some(id);
        }
        self.nodes[id.index()].children = children;
    }

    /// Replace the content of an element with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        let node = self.create_text(text);
        self.set_children(id, vec![node]);
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// First top-level element.
    pub fn root_element(&self) -> Option<NodeId> {
        self.roots.iter().copied().find(|&r| self.name(r).is_some())
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()].data
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    /// Qualified element name, or `None` for non-element nodes.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.index()].data {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId, name: &str) -> bool {
        self.name(id) == Some(name)
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&str> {
        match &self.nodes[id.index()].data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// Set (or add) an attribute. The start tag is re-rendered on output.
    pub fn set_attr(&mut self, id: NodeId, key: &str, value: &str) {
        if let NodeData::Element {
            attrs, raw_open, ..
        } = &mut self.nodes[id.index()].data
        {
            match attrs.iter_mut().find(|(k, _)| k == key) {
                Some((_, v)) => *v = value.to_string(),
                None => attrs.push((key.to_string(), value.to_string())),
            }
            *raw_open = None;
        }
    }

    /// Remove an attribute. Returns whether it was present.
    pub fn remove_attr(&mut self, id: NodeId, key: &str) -> bool {
        let NodeData::Element {
            attrs, raw_open, ..
        } = &mut self.nodes[id.index()].data
        else {
            return false;
        };
        let before = attrs.len();
        attrs.retain(|(k, _)| k != key);
        if attrs.len() == before {
            return false;
        }
        *raw_open = None;
        true
    }

    /// Descendants of `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Every attached node in document order.
    pub fn document_order(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        for &root in &self.roots {
            out.push(root);
            out.extend(self.descendants(root));
        }
        out
    }

    /// First attached element with the given name, in document order.
    pub fn find_first(&self, name: &str) -> Option<NodeId> {
        self.document_order()
            .into_iter()
            .find(|&id| self.is_element(id, name))
    }

    /// Unescaped text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut text = String::new();
        for node in self.descendants(id) {
            if let NodeData::Text(raw) = self.data(node) {
                text.push_str(&unescape_lossy(raw));
            }
        }
        text
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    /// Serialize the whole document.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        for &root in &self.roots {
            self.write_node(root, &mut out);
        }
        out
    }

    /// Serialize a single subtree.
    pub fn node_to_xml(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        enum Step {
            Open(NodeId),
            Close(NodeId),
        }

        let mut stack = vec![Step::Open(id)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Open(id) => {
                    let node = &self.nodes[id.index()];
                    match &node.data {
                        NodeData::Text(raw) | NodeData::Markup(raw) => out.push_str(raw),
                        NodeData::Element {
                            name,
                            attrs,
                            raw_open,
                            self_closing,
                            ..
                        } => {
                            if node.children.is_empty() && *self_closing {
                                match raw_open {
                                    Some(raw) => out.push_str(raw),
                                    None => render_open(out, name, attrs, true),
                                }
                                continue;
                            }
                            match raw_open {
                                Some(raw) if !*self_closing => out.push_str(raw),
                                _ => render_open(out, name, attrs, false),
                            }
                            stack.push(Step::Close(id));
                            stack.extend(node.children.iter().rev().map(|&c| Step::Open(c)));
                        }
                    }
                }
                Step::Close(id) => {
                    if let NodeData::Element {
                        name, raw_close, ..
                    } = &self.nodes[id.index()].data
                    {
                        match raw_close {
                            Some(raw) => out.push_str(raw),
                            None => {
                                out.push_str("</");
                                out.push_str(name);
                                out.push('>');
                            }
                        }
                    }
                }
            }
        }
    }
}

fn render_open(out: &mut String, name: &str, attrs: &[(String, String)], self_closing: bool) {
    out.push('<');
    out.push_str(name);
    for (key, value) in attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value.as_str()));
        out.push('"');
    }
    out.push_str(if self_closing { "/>" } else { ">" });
}

/// Unescape character data, keeping the raw text if it is malformed.
pub fn unescape_lossy(raw: &str) -> Cow<'_, str> {
    unescape(raw).unwrap_or(Cow::Borrowed(raw))
}
