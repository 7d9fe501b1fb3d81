//! Main document part with a position-addressed paragraph list.
//!
//! Paragraphs have no identity beyond their index in document order. The
//! list is rebuilt by [`Body::reindex`] after every structural edit so that
//! indices always match what the scanner would report for the current tree.

use crate::error::{Error, Result};
use crate::xml::{NodeId, XmlTree};

use super::scanner::{self, BookmarkIndex};
use super::{BODY, BOOKMARK_END, BOOKMARK_START, PARAGRAPH, PARAGRAPH_PROPERTIES, RUN, TEXT};

/// A parsed `word/document.xml`.
#[derive(Debug, Clone)]
pub struct Body {
    tree: XmlTree,
    body: NodeId,
    paragraphs: Vec<NodeId>,
}

impl Body {
    /// Parse body XML. Fails if there is no `w:body` element.
    pub fn parse(xml: &str) -> Result<Self> {
        if xml.trim().is_empty() {
            return Err(Error::Structure("document body is empty".into()));
        }
        let tree = XmlTree::parse(xml)?;
        let body = tree
            .find_first(BODY)
            .ok_or_else(|| Error::Structure("no w:body element".into()))?;
        let paragraphs = scanner::paragraph_nodes(&tree);
        Ok(Self {
            tree,
            body,
            paragraphs,
        })
    }

    pub fn tree(&self) -> &XmlTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut XmlTree {
        &mut self.tree
    }

    /// The `w:body` element.
    pub fn body_node(&self) -> NodeId {
        self.body
    }

    pub fn paragraphs(&self) -> &[NodeId] {
        &self.paragraphs
    }

    pub fn paragraph(&self, index: usize) -> Option<NodeId> {
        self.paragraphs.get(index).copied()
    }

    /// Recollect the paragraph list after inserting or removing paragraphs.
    pub fn reindex(&mut self) {
        self.paragraphs = scanner::paragraph_nodes(&self.tree);
    }

    /// Scan the current tree for bookmarks.
    pub fn bookmarks(&self) -> BookmarkIndex {
        scanner::scan_tree(&self.tree)
    }

    pub fn to_xml(&self) -> String {
        self.tree.to_xml()
    }

    /// Insert a single-run paragraph right after the `w:body` start tag.
    pub fn prepend_text_paragraph(&mut self, text: &str) -> NodeId {
        let tree = &mut self.tree;
        let paragraph = tree.create_element(PARAGRAPH, &[]);
        let run = tree.create_element(RUN, &[]);
        let t = tree.create_element(TEXT, &[("xml:space", "preserve")]);
        tree.set_text(t, text);
        tree.append_child(run, t);
        tree.append_child(paragraph, run);
        tree.insert_child(self.body, 0, paragraph);
        self.reindex();
        paragraph
    }

    /// Replace the visible content of `host` with that of `source`.
    ///
    /// The host keeps every bookmark marker it holds, wherever it sits: the
    /// markers before and between its runs move to the head in document
    /// order, and its trailing `w:bookmarkEnd` run stays at the end.
    /// Everything else comes from the source paragraph. The source `w:pPr`
    /// wins over the host's. Trailing end markers are skipped when an end
    /// with the same id is already present, unless `force_keep_end` is set.
    pub fn replace_content(
        &mut self,
        host: NodeId,
        source: &XmlTree,
        source_paragraph: NodeId,
        force_keep_end: bool,
    ) {
        let tree = &mut self.tree;
        let children = tree.children(host).to_vec();

        let tail_len = children
            .iter()
            .rev()
            .take_while(|&&c| tree.is_element(c, BOOKMARK_END))
            .count();
        let (content, tail) = children.split_at(children.len() - tail_len);

        let mut host_props = None;
        let mut carried = Vec::new();
        for &child in content {
            if tree.is_element(child, PARAGRAPH_PROPERTIES) {
                host_props = host_props.or(Some(child));
            } else if is_marker(tree, child) {
                carried.push(child);
            } else {
                carried.extend(
                    tree.descendants(child)
                        .into_iter()
                        .filter(|&d| is_marker(tree, d)),
                );
            }
        }

        let source_children = source.children(source_paragraph);
        let source_props = source_children
            .iter()
            .copied()
            .find(|&c| source.is_element(c, PARAGRAPH_PROPERTIES));

        let mut buffer = Vec::with_capacity(1 + carried.len() + source_children.len() + tail_len);
        match (source_props, host_props) {
            (Some(props), _) => buffer.push(tree.import(source, props)),
            (None, Some(props)) => buffer.push(props),
            (None, None) => {}
        }
        buffer.extend(carried);

        for &child in source_children {
            if is_structural(source, child) {
                continue;
            }
            buffer.push(tree.import(source, child));
        }

        for &end in tail {
            let id = tree.attr(end, "w:id");
            let duplicate = buffer
                .iter()
                .any(|&b| tree.is_element(b, BOOKMARK_END) && tree.attr(b, "w:id") == id);
            if force_keep_end || !duplicate {
                buffer.push(end);
            }
        }

        tree.set_children(host, buffer);
    }

    /// Ids of the `w:bookmarkEnd` markers inside `node`.
    pub fn end_marker_ids(&self, node: NodeId) -> Vec<u32> {
        self.tree
            .descendants(node)
            .into_iter()
            .filter(|&d| self.tree.is_element(d, BOOKMARK_END))
            .filter_map(|d| scanner::marker_id(&self.tree, d))
            .collect()
    }

    /// Remove every bookmark marker inside `node`.
    pub fn strip_bookmark_markers(&mut self, node: NodeId) {
        let markers: Vec<_> = self
            .tree
            .descendants(node)
            .into_iter()
            .filter(|&d| is_marker(&self.tree, d))
            .collect();
        for marker in markers {
            self.tree.detach(marker);
        }
    }

    /// All attached `w:bookmarkEnd` elements for bookmark `id`.
    pub fn bookmark_ends(&self, id: u32) -> Vec<NodeId> {
        self.tree
            .document_order()
            .into_iter()
            .filter(|&n| {
                self.tree.is_element(n, BOOKMARK_END) && scanner::marker_id(&self.tree, n) == Some(id)
            })
            .collect()
    }

    /// Append a fresh `w:bookmarkEnd` for `id` to `paragraph`.
    pub fn append_bookmark_end(&mut self, paragraph: NodeId, id: u32) {
        let id = id.to_string();
        let end = self.tree.create_element(BOOKMARK_END, &[("w:id", id.as_str())]);
        self.tree.append_child(paragraph, end);
    }

    /// Move a marker to the head of `paragraph`, after its `w:pPr` if any.
    pub fn move_to_head(&mut self, marker: NodeId, paragraph: NodeId) {
        self.tree.detach(marker);
        let index = match self.tree.children(paragraph).first() {
            Some(&first) if self.tree.is_element(first, PARAGRAPH_PROPERTIES) => 1,
            _ => 0,
        };
        self.tree.insert_child(paragraph, index, marker);
    }

    /// Marker elements for bookmark `id` that are not inside any paragraph.
    pub fn detached_markers(&self, id: u32) -> Vec<NodeId> {
        self.tree
            .document_order()
            .into_iter()
            .filter(|&n| is_marker(&self.tree, n) && scanner::marker_id(&self.tree, n) == Some(id))
            .filter(|&n| !self.inside_paragraph(n))
            .collect()
    }

    fn inside_paragraph(&self, node: NodeId) -> bool {
        let mut cursor = self.tree.parent(node);
        while let Some(id) = cursor {
            if self.tree.is_element(id, PARAGRAPH) {
                return true;
            }
            cursor = self.tree.parent(id);
        }
        false
    }
}

fn is_marker(tree: &XmlTree, id: NodeId) -> bool {
    tree.is_element(id, BOOKMARK_START) || tree.is_element(id, BOOKMARK_END)
}

fn is_structural(tree: &XmlTree, id: NodeId) -> bool {
    is_marker(tree, id) || tree.is_element(id, PARAGRAPH_PROPERTIES)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(paragraphs: &str) -> String {
        format!(r#"<w:document xmlns:w="urn:w"><w:body>{paragraphs}</w:body></w:document>"#)
    }

    fn source(paragraph: &str) -> (XmlTree, NodeId) {
        let tree = XmlTree::parse(paragraph).unwrap();
        let root = tree.root_element().unwrap();
        (tree, root)
    }

    #[test]
    fn test_missing_body_is_structural_error() {
        assert!(matches!(Body::parse("<w:document/>"), Err(Error::Structure(_))));
        assert!(matches!(Body::parse("  "), Err(Error::Structure(_))));
    }

    #[test]
    fn test_replace_content_keeps_host_markers() {
        let mut body = Body::parse(&wrap(
            r#"<w:p><w:pPr><w:jc w:val="left"/></w:pPr><w:bookmarkStart w:id="1" w:name="А"/><w:r><w:t>old</w:t></w:r><w:bookmarkEnd w:id="1"/></w:p>"#,
        ))
        .unwrap();
        let (src, p) = source(
            r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:bookmarkStart w:id="8" w:name="А"/><w:r><w:t>new</w:t></w:r><w:bookmarkEnd w:id="8"/></w:p>"#,
        );
        let host = body.paragraph(0).unwrap();
        body.replace_content(host, &src, p, false);

        assert_eq!(
            body.tree().node_to_xml(host),
            r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:bookmarkStart w:id="1" w:name="А"/><w:r><w:t>new</w:t></w:r><w:bookmarkEnd w:id="1"/></w:p>"#
        );
    }

    #[test]
    fn test_replace_content_keeps_markers_after_a_label() {
        let mut body = Body::parse(&wrap(
            r#"<w:p><w:r><w:t>Label: </w:t></w:r><w:bookmarkStart w:id="1" w:name="А"/><w:r><w:bookmarkStart w:id="2" w:name="_GoBack"/><w:t>old</w:t></w:r><w:bookmarkEnd w:id="2"/><w:r><w:t>!</w:t></w:r><w:bookmarkEnd w:id="1"/></w:p>"#,
        ))
        .unwrap();
        let before = body.bookmarks();
        let (src, p) = source(r#"<w:p><w:r><w:t>new</w:t></w:r></w:p>"#);
        let host = body.paragraph(0).unwrap();
        body.replace_content(host, &src, p, false);

        assert_eq!(
            body.tree().node_to_xml(host),
            r#"<w:p><w:bookmarkStart w:id="1" w:name="А"/><w:bookmarkStart w:id="2" w:name="_GoBack"/><w:bookmarkEnd w:id="2"/><w:r><w:t>new</w:t></w:r><w:bookmarkEnd w:id="1"/></w:p>"#
        );
        assert_eq!(body.bookmarks(), before);
    }

    #[test]
    fn test_replace_content_keeps_host_props_without_source_props() {
        let mut body =
            Body::parse(&wrap(r#"<w:p><w:pPr><w:b/></w:pPr><w:r><w:t>old</w:t></w:r></w:p>"#)).unwrap();
        let (src, p) = source(r#"<w:p><w:r><w:t>new</w:t></w:r></w:p>"#);
        let host = body.paragraph(0).unwrap();
        body.replace_content(host, &src, p, false);

        assert_eq!(
            body.tree().node_to_xml(host),
            r#"<w:p><w:pPr><w:b/></w:pPr><w:r><w:t>new</w:t></w:r></w:p>"#
        );
    }

    #[test]
    fn test_replace_content_skips_duplicate_end_unless_forced() {
        let xml = wrap(r#"<w:p><w:bookmarkEnd w:id="4"/><w:r/><w:bookmarkEnd w:id="4"/></w:p>"#);
        let (src, p) = source(r#"<w:p><w:r><w:t>x</w:t></w:r></w:p>"#);

        let mut body = Body::parse(&xml).unwrap();
        let host = body.paragraph(0).unwrap();
        body.replace_content(host, &src, p, false);
        assert_eq!(body.bookmark_ends(4).len(), 1);

        let mut body = Body::parse(&xml).unwrap();
        let host = body.paragraph(0).unwrap();
        body.replace_content(host, &src, p, true);
        assert_eq!(body.bookmark_ends(4).len(), 2);
    }

    #[test]
    fn test_prepend_text_paragraph_shifts_indices() {
        let mut body = Body::parse(&wrap("<w:p><w:r/></w:p>")).unwrap();
        let original = body.paragraph(0).unwrap();
        let banner = body.prepend_text_paragraph("Old & replaced");

        assert_eq!(body.paragraphs(), &[banner, original]);
        assert!(body.to_xml().contains(
            r#"<w:body><w:p><w:r><w:t xml:space="preserve">Old &amp; replaced</w:t></w:r></w:p>"#
        ));
    }

    #[test]
    fn test_detached_markers_and_move_to_head() {
        let mut body = Body::parse(&wrap(
            r#"<w:bookmarkStart w:id="2" w:name="Б"/><w:p><w:pPr/><w:r/></w:p>"#,
        ))
        .unwrap();
        let markers = body.detached_markers(2);
        assert_eq!(markers.len(), 1);

        let paragraph = body.paragraph(0).unwrap();
        body.move_to_head(markers[0], paragraph);
        assert!(body.detached_markers(2).is_empty());
        assert_eq!(
            body.tree().node_to_xml(paragraph),
            r#"<w:p><w:pPr/><w:bookmarkStart w:id="2" w:name="Б"/><w:r/></w:p>"#
        );
    }
}
