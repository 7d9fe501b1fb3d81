//! Plain-text extraction from word-processing containers.

use std::path::Path;

use crate::error::Result;
use crate::package::{BODY_PART, Package};
use crate::xml::{NodeData, NodeId, XmlTree, unescape_lossy};

use super::{PARAGRAPH, PARAGRAPH_PROPERTIES, TEXT};

/// Turns a container on disk into plain text.
///
/// The composer only hands out paths, so implementations are free to shell
/// out to external converters.
pub trait TextExtractor {
    fn extract_text(&self, path: &Path) -> Result<String>;
}

/// Built-in extractor reading `w:t` runs straight from the body part.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract_text(&self, path: &Path) -> Result<String> {
        let package = Package::open(path)?;
        let tree = XmlTree::parse(&package.read_entry_as_text(BODY_PART)?)?;
        Ok(extract_body_text(&tree))
    }
}

/// Text of a parsed body: one line per paragraph, tabs and breaks kept.
pub fn extract_body_text(tree: &XmlTree) -> String {
    enum Step {
        Enter(NodeId, bool),
        Leave,
    }

    let mut out = String::new();
    let mut stack: Vec<Step> = tree
        .roots()
        .iter()
        .rev()
        .map(|&r| Step::Enter(r, false))
        .collect();

    while let Some(step) = stack.pop() {
        let (id, in_text) = match step {
            Step::Enter(id, in_text) => (id, in_text),
            Step::Leave => {
                out.push('\n');
                continue;
            }
        };

        match tree.data(id) {
            NodeData::Text(raw) if in_text => out.push_str(&unescape_lossy(raw)),
            NodeData::Element { name, .. } => {
                let in_text = match name.as_str() {
                    PARAGRAPH => {
                        stack.push(Step::Leave);
                        false
                    }
                    TEXT => true,
                    // Tab stops and other layout, not content.
                    PARAGRAPH_PROPERTIES => continue,
                    "w:tab" => {
                        out.push('\t');
                        false
                    }
                    "w:br" | "w:cr" => {
                        out.push('\n');
                        false
                    }
                    _ => false,
                };
                stack.extend(tree.children(id).iter().rev().map(|&c| Step::Enter(c, in_text)));
            }
            _ => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_paragraphs_tabs_and_breaks() {
        let tree = XmlTree::parse(
            r#"<w:document><w:body><w:p><w:r><w:t>Раздел</w:t><w:tab/><w:t>1 &amp; 2</w:t></w:r></w:p><w:p><w:r><w:t>a</w:t><w:br/><w:t>b</w:t></w:r></w:p><w:sectPr/></w:body></w:document>"#,
        )
        .unwrap();
        assert_eq!(extract_body_text(&tree), "Раздел\t1 & 2\na\nb\n");
    }

    #[test]
    fn test_tab_stop_definitions_are_not_text() {
        let tree = XmlTree::parse(
            r#"<w:body><w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/><w:tab w:val="right" w:leader="dot" w:pos="9350"/></w:tabs></w:pPr><w:r><w:t>Title</w:t><w:tab/><w:t>3</w:t></w:r></w:p></w:body>"#,
        )
        .unwrap();
        assert_eq!(extract_body_text(&tree), "Title\t3\n");
    }

    #[test]
    fn test_instruction_text_is_skipped() {
        let tree = XmlTree::parse(
            r#"<w:body><w:p><w:r><w:instrText>PAGE</w:instrText></w:r><w:r><w:t>1</w:t></w:r></w:p></w:body>"#,
        )
        .unwrap();
        assert_eq!(extract_body_text(&tree), "1\n");
    }
}
