//! Composition of a document tree into one container.
//!
//! [`Composer::compose`] walks a [`DocumentNode`] depth first with an
//! explicit stack. Every internal node gets a [`Merger`] loaded from its own
//! container; children are spliced into it in list order, deeper subtrees
//! being composed first. Leaves are read as they are.
//!
//! # Example
//!
//! ```no_run
//! use docweave::compose::{ComposeConfig, Composer};
//! use docweave::tree::DocumentNode;
//!
//! let root = DocumentNode::new(1, "contract.docx")
//!     .with_child(DocumentNode::new(2, "annex.docx"));
//!
//! let composer = Composer::new().with_config(ComposeConfig::default().with_output_dir("out"));
//! let path = composer.compose_to_file(&root)?;
//! println!("{}", path.display());
//! # Ok::<(), docweave::Error>(())
//! ```

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::docx::body::Body;
use crate::docx::rels::Relationships;
use crate::docx::text::{PlainTextExtractor, TextExtractor};
use crate::error::{Error, Result};
use crate::merge::Merger;
use crate::package::{BODY_PART, Package, RELS_PART};
use crate::tree::DocumentNode;

/// Default text of the banner placed on superseded documents.
pub const DEFAULT_BANNER: &str = "Документ утратил силу. Действует документ № {id}.";

/// Configuration for composition.
#[derive(Debug, Clone)]
pub struct ComposeConfig {
    /// Directory receiving composed containers and temporary files.
    pub output_dir: PathBuf,
    /// Banner text for superseded documents; `{id}` expands to the id of the
    /// superseding document.
    pub banner_template: String,
    /// Deepest nesting accepted before giving up.
    pub max_depth: usize,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir(),
            banner_template: DEFAULT_BANNER.to_string(),
            max_depth: 64,
        }
    }
}

impl ComposeConfig {
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_banner_template(mut self, template: impl Into<String>) -> Self {
        self.banner_template = template.into();
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    fn banner(&self, superseded_by: i64) -> String {
        self.banner_template.replace("{id}", &superseded_by.to_string())
    }
}

/// A document with all of its descendants folded in.
#[derive(Debug, Clone)]
pub struct ComposedDocument {
    pub id: i64,
    pub content_path: PathBuf,
    pub parent_id: Option<i64>,
    /// Cleared once the banner has been inserted.
    pub superseded_by_id: Option<i64>,
    pub level: u32,
    pub body: Body,
    pub relationships: Relationships,
    /// Base name of the container written by [`Composer::write`].
    pub output_file_name: String,
}

impl ComposedDocument {
    fn new(node: &DocumentNode, body: Body, relationships: Relationships) -> Self {
        let output_file_name = node
            .content_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.docx", node.id));
        Self {
            id: node.id,
            content_path: node.content_path.clone(),
            parent_id: node.parent_id,
            superseded_by_id: node.superseded_by_id,
            level: node.level,
            body,
            relationships,
            output_file_name,
        }
    }

    /// Read a document without merging anything into it.
    fn read(node: &DocumentNode) -> Result<Self> {
        let (body, rels) = read_parts(&node.content_path)?;
        Ok(Self::new(node, Body::parse(&body)?, Relationships::parse(&rels)?))
    }

    pub fn body_xml(&self) -> String {
        self.body.to_xml()
    }

    pub fn rels_xml(&self) -> String {
        self.relationships.to_xml()
    }
}

fn read_parts(path: &Path) -> Result<(String, String)> {
    let package = Package::open(path)?;
    Ok((
        package.read_entry_as_text(BODY_PART)?,
        package.read_entry_as_text(RELS_PART)?,
    ))
}

/// An internal node whose children are being spliced in.
struct Frame<'a> {
    node: &'a DocumentNode,
    merger: Merger,
    next_child: usize,
}

/// Composes document trees.
pub struct Composer {
    config: ComposeConfig,
    extractor: Box<dyn TextExtractor>,
}

impl Composer {
    /// Create a composer with default configuration and the built-in
    /// text extractor.
    pub fn new() -> Self {
        Self {
            config: ComposeConfig::default(),
            extractor: Box::new(PlainTextExtractor),
        }
    }

    pub fn with_config(mut self, config: ComposeConfig) -> Self {
        self.config = config;
        self
    }

    /// Use another text extractor for [`Composer::extract_text`].
    pub fn with_extractor(mut self, extractor: impl TextExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn config(&self) -> &ComposeConfig {
        &self.config
    }

    /// Fold every descendant of `root` into it.
    ///
    /// A leaf comes back exactly as stored. Ids met twice during the walk
    /// are rejected as [`Error::Cycle`].
    pub fn compose(&self, root: &DocumentNode) -> Result<ComposedDocument> {
        if root.is_leaf() {
            return ComposedDocument::read(root);
        }

        let mut visited = HashSet::new();
        let mut stack = vec![self.enter(root, &mut visited, 1)?];

        loop {
            let Some(frame) = stack.last_mut() else {
                return Err(Error::Structure("composition stack emptied early".into()));
            };

            let node = frame.node;
            if let Some(child) = node.children.get(frame.next_child) {
                frame.next_child += 1;
                if child.is_leaf() {
                    if !visited.insert(child.id) {
                        return Err(Error::Cycle(child.id));
                    }
                    debug!("splicing leaf {} into {}", child.id, node.id);
                    let (body, rels) = read_parts(&child.content_path)?;
                    frame.merger.splice_one(&body, &rels)?;
                } else {
                    let depth = stack.len() + 1;
                    let next = self.enter(child, &mut visited, depth)?;
                    stack.push(next);
                }
                continue;
            }

            let Some(frame) = stack.pop() else {
                continue;
            };
            let composed = self.finish(frame);
            match stack.last_mut() {
                Some(parent) => {
                    debug!("splicing composed {} into {}", composed.id, parent.node.id);
                    parent
                        .merger
                        .splice_one(&composed.body_xml(), &composed.rels_xml())?;
                }
                None => return Ok(composed),
            }
        }
    }

    fn enter<'a>(
        &self,
        node: &'a DocumentNode,
        visited: &mut HashSet<i64>,
        depth: usize,
    ) -> Result<Frame<'a>> {
        if depth > self.config.max_depth {
            return Err(Error::DepthExceeded(self.config.max_depth));
        }
        if !visited.insert(node.id) {
            warn!("document {} reached twice while composing", node.id);
            return Err(Error::Cycle(node.id));
        }
        let (body, rels) = read_parts(&node.content_path)?;
        Ok(Frame {
            node,
            merger: Merger::load(&body, &rels)?,
            next_child: 0,
        })
    }

    fn finish(&self, frame: Frame<'_>) -> ComposedDocument {
        let Frame { node, mut merger, .. } = frame;
        let mut superseded_by_id = node.superseded_by_id;
        if let Some(successor) = superseded_by_id.take() {
            merger.insert_banner(&self.config.banner(successor));
        }

        let (body, relationships) = merger.into_parts();
        let mut composed = ComposedDocument::new(node, body, relationships);
        composed.superseded_by_id = superseded_by_id;
        composed
    }

    /// Compose and return the merged body XML.
    pub fn compose_xml(&self, root: &DocumentNode) -> Result<String> {
        Ok(self.compose(root)?.body_xml())
    }

    /// Package a composed document: the original container with its body and
    /// relationship parts replaced.
    fn package(&self, doc: &ComposedDocument) -> Result<Package> {
        let mut package = Package::open(&doc.content_path)?;
        package.delete_entry(BODY_PART);
        package.delete_entry(RELS_PART);
        package.add_entry(BODY_PART, doc.body_xml());
        package.add_entry(RELS_PART, doc.rels_xml());
        Ok(package)
    }

    /// Save a composed document as `output_dir/<output_file_name>`.
    pub fn write(&self, doc: &ComposedDocument) -> Result<PathBuf> {
        let package = self.package(doc)?;
        fs::create_dir_all(&self.config.output_dir)?;
        let path = self.config.output_dir.join(&doc.output_file_name);
        package.save(&path)?;
        info!("wrote composed document {} to {}", doc.id, path.display());
        Ok(path)
    }

    /// Compose `root` and save the result.
    pub fn compose_to_file(&self, root: &DocumentNode) -> Result<PathBuf> {
        let doc = self.compose(root)?;
        self.write(&doc)
    }

    /// Plain text of the composed document.
    ///
    /// Leaves are handed to the extractor directly. Internal nodes are
    /// composed into a temporary container that is removed afterwards,
    /// whether extraction succeeds or not.
    pub fn extract_text(&self, root: &DocumentNode) -> Result<String> {
        if root.is_leaf() {
            return self.extractor.extract_text(&root.content_path);
        }

        let doc = self.compose(root)?;
        let package = self.package(&doc)?;

        fs::create_dir_all(&self.config.output_dir)?;
        let mut temp = tempfile::Builder::new()
            .prefix("docweave-")
            .suffix(".docx")
            .tempfile_in(&self.config.output_dir)?;
        package.write_to(temp.as_file_mut())?.flush()?;

        let text = self.extractor.extract_text(temp.path())?;
        if let Err(e) = temp.close() {
            warn!("could not remove temporary container: {e}");
        }
        Ok(text)
    }
}

impl Default for Composer {
    fn default() -> Self {
        Self::new()
    }
}
