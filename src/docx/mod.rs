//! WordprocessingML parts: body, bookmarks, relationships, core properties.

pub mod body;
pub mod props;
pub mod rels;
pub mod scanner;
pub mod text;

pub use body::Body;
pub use props::{
    CoreProperty, PropertyRecord, apply_properties, parse_properties, read_properties,
    write_properties,
};
pub use rels::Relationships;
pub use scanner::{Bookmark, BookmarkIndex, Scanner, Token, scan, scan_tree};
pub use text::{PlainTextExtractor, TextExtractor, extract_body_text};

pub(crate) const BODY: &str = "w:body";
pub(crate) const PARAGRAPH: &str = "w:p";
pub(crate) const PARAGRAPH_PROPERTIES: &str = "w:pPr";
pub(crate) const RUN: &str = "w:r";
pub(crate) const TEXT: &str = "w:t";
pub(crate) const BOOKMARK_START: &str = "w:bookmarkStart";
pub(crate) const BOOKMARK_END: &str = "w:bookmarkEnd";
pub(crate) const HYPERLINK: &str = "w:hyperlink";
