//! OOXML package (ZIP container) access.
//!
//! A [`Package`] holds every entry of a word-processing container in memory,
//! in archive order. Nothing here knows about bookmarks or merging; callers
//! read the parts they care about as text and replace them as bytes.

use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};
use crate::util::decode_text;

/// Main document body part.
pub const BODY_PART: &str = "word/document.xml";
/// Relationships of the main document part.
pub const RELS_PART: &str = "word/_rels/document.xml.rels";
/// Core (Dublin Core) properties part.
pub const CORE_PART: &str = "docProps/core.xml";

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
}

/// An in-memory word-processing package.
#[derive(Debug, Clone, Default)]
pub struct Package {
    entries: Vec<Entry>,
}

impl Package {
    /// Open a container from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Open a container from an in-memory buffer.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_reader(Cursor::new(data))
    }

    /// Read a container from any [`Read`] + [`Seek`] source.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut entries = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push(Entry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
            });
        }

        Ok(Self { entries })
    }

    /// Names of all entries, in archive order.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Raw bytes of an entry.
    pub fn read_entry(&self, name: &str) -> Result<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data.as_slice())
            .ok_or_else(|| Error::MissingEntry(name.to_string()))
    }

    /// Entry contents decoded as text.
    pub fn read_entry_as_text(&self, name: &str) -> Result<String> {
        Ok(decode_text(self.read_entry(name)?)?.into_owned())
    }

    /// Remove an entry. Returns whether it existed.
    pub fn delete_entry(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.name != name);
        self.entries.len() != before
    }

    /// Add an entry, replacing any existing entry of the same name.
    ///
    /// New entries are appended after the existing ones and deflated.
    pub fn add_entry(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        let name = name.into();
        self.delete_entry(&name);
        self.entries.push(Entry {
            name,
            data: data.into(),
            compression: CompressionMethod::Deflated,
        });
    }

    /// Write the package to disk.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_to(file)?;
        Ok(())
    }

    /// Serialize the package into memory.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let cursor = self.write_to(Cursor::new(Vec::new()))?;
        Ok(cursor.into_inner())
    }

    /// Write the package to any [`Write`] + [`Seek`] destination.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<W> {
        let mut zip = ZipWriter::new(writer);

        let options_stored =
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let options_deflate =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for entry in &self.entries {
            let options = if entry.compression == CompressionMethod::Stored {
                options_stored
            } else {
                options_deflate
            };
            zip.start_file(entry.name.as_str(), options)?;
            zip.write_all(&entry.data)?;
        }

        Ok(zip.finish()?)
    }
}
