//! Error types for docweave operations.

use thiserror::Error;

/// Errors that can occur while reading, merging or writing documents.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// A UTF-16 part that does not decode cleanly.
    #[error("Malformed {0} text in package part")]
    Encoding(&'static str),

    #[error("Missing package entry: {0}")]
    MissingEntry(String),

    /// The document lacks a body, paragraphs, bookmarks or relationships.
    #[error("Invalid document structure: {0}")]
    Structure(String),

    #[error("Document {0} not found in the supplied records")]
    RootNotFound(i64),

    #[error("Document {0} is its own ancestor")]
    Cycle(i64),

    #[error("Document tree deeper than {0} levels")]
    DepthExceeded(usize),

    #[error("Invalid value for property `{field}`: {value:?}")]
    InvalidProperty { field: String, value: String },
}

pub type Result<T> = std::result::Result<T, Error>;
