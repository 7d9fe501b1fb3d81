//! # docweave
//!
//! Assemble a hierarchy of Word documents into one, splicing each child's
//! content into a named bookmark of its parent.
//!
//! ## Features
//!
//! - Link flat document records into trees ([`tree`])
//! - Index bookmark ranges by paragraph position ([`docx::scan`])
//! - Splice children into placeholders, keeping formatting and hyperlinks
//!   ([`Merger`])
//! - Write the composed container, or extract its text ([`Composer`])
//! - Read and rewrite core document properties
//!
//! ## Quick Start
//!
//! ```no_run
//! use docweave::{Composer, DocumentRecord, build_tree};
//!
//! let records = vec![
//!     DocumentRecord::new(1, "contract.docx"),
//!     DocumentRecord::new(2, "annex.docx").with_parent(1).with_level(1),
//! ];
//! let root = build_tree(&records, 1)?;
//!
//! let path = Composer::new().compose_to_file(&root)?;
//! println!("composed into {}", path.display());
//! # Ok::<(), docweave::Error>(())
//! ```
//!
//! ## Merging Parts Directly
//!
//! ```no_run
//! use docweave::Merger;
//!
//! # let (host_body, host_rels, child_body, child_rels) = (String::new(), String::new(), String::new(), String::new());
//! let mut merger = Merger::load(&host_body, &host_rels)?;
//! merger.splice_one(&child_body, &child_rels)?;
//! let merged = merger.body_xml();
//! # Ok::<(), docweave::Error>(())
//! ```

pub mod compose;
pub mod docx;
pub mod error;
pub mod merge;
pub mod package;
pub mod tree;
pub(crate) mod util;
pub mod xml;

pub use compose::{ComposeConfig, ComposedDocument, Composer};
pub use docx::{
    Bookmark, BookmarkIndex, CoreProperty, PlainTextExtractor, PropertyRecord, TextExtractor,
    read_properties, scan, write_properties,
};
pub use error::{Error, Result};
pub use merge::{EndMarkerPolicy, Merger};
pub use package::Package;
pub use tree::{DocumentNode, DocumentRecord, build_forest, build_tree};
