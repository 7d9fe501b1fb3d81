//! Core document properties (`docProps/core.xml`).

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::error::{Error, Result};
use crate::package::{CORE_PART, Package};
use crate::xml::XmlTree;

/// The recognized core-properties fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CoreProperty {
    Title,
    Subject,
    Creator,
    Keywords,
    LastModifiedBy,
    Revision,
    CreatedAt,
    UpdatedAt,
}

impl CoreProperty {
    pub const ALL: [CoreProperty; 8] = [
        CoreProperty::Title,
        CoreProperty::Subject,
        CoreProperty::Creator,
        CoreProperty::Keywords,
        CoreProperty::LastModifiedBy,
        CoreProperty::Revision,
        CoreProperty::CreatedAt,
        CoreProperty::UpdatedAt,
    ];

    /// Field name as exchanged with callers.
    pub fn key(self) -> &'static str {
        match self {
            CoreProperty::Title => "title",
            CoreProperty::Subject => "subject",
            CoreProperty::Creator => "creator",
            CoreProperty::Keywords => "keywords",
            CoreProperty::LastModifiedBy => "lastModifiedBy",
            CoreProperty::Revision => "revision",
            CoreProperty::CreatedAt => "createdAt",
            CoreProperty::UpdatedAt => "updatedAt",
        }
    }

    /// Qualified element name inside `cp:coreProperties`.
    pub fn element(self) -> &'static str {
        match self {
            CoreProperty::Title => "dc:title",
            CoreProperty::Subject => "dc:subject",
            CoreProperty::Creator => "dc:creator",
            CoreProperty::Keywords => "cp:keywords",
            CoreProperty::LastModifiedBy => "cp:lastModifiedBy",
            CoreProperty::Revision => "cp:revision",
            CoreProperty::CreatedAt => "dcterms:created",
            CoreProperty::UpdatedAt => "dcterms:modified",
        }
    }

    pub fn is_date(self) -> bool {
        matches!(self, CoreProperty::CreatedAt | CoreProperty::UpdatedAt)
    }
}

impl fmt::Display for CoreProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for CoreProperty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.replace(['_', '-'], "").to_ascii_lowercase();
        CoreProperty::ALL
            .into_iter()
            .find(|p| p.key().to_ascii_lowercase() == wanted)
            .ok_or_else(|| Error::InvalidProperty {
                field: s.to_string(),
                value: String::new(),
            })
    }
}

/// Core properties of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct PropertyRecord {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub keywords: Option<String>,
    pub last_modified_by: Option<String>,
    pub revision: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PropertyRecord {
    /// The set fields as updates for [`write_properties`], dates as
    /// millisecond timestamps.
    pub fn updates(&self) -> Vec<(CoreProperty, String)> {
        let text = [
            (CoreProperty::Title, &self.title),
            (CoreProperty::Subject, &self.subject),
            (CoreProperty::Creator, &self.creator),
            (CoreProperty::Keywords, &self.keywords),
            (CoreProperty::LastModifiedBy, &self.last_modified_by),
            (CoreProperty::Revision, &self.revision),
        ];
        let dates = [
            (CoreProperty::CreatedAt, &self.created_at),
            (CoreProperty::UpdatedAt, &self.updated_at),
        ];

        text.into_iter()
            .filter_map(|(p, v)| v.clone().map(|v| (p, v)))
            .chain(
                dates
                    .into_iter()
                    .filter_map(|(p, v)| v.map(|d| (p, d.timestamp_millis().to_string()))),
            )
            .collect()
    }
}

/// Read the core properties of a container on disk.
pub fn read_properties<P: AsRef<Path>>(path: P) -> Result<PropertyRecord> {
    let package = Package::open(path)?;
    parse_properties(&package.read_entry_as_text(CORE_PART)?)
}

/// Parse a `docProps/core.xml` part.
pub fn parse_properties(xml: &str) -> Result<PropertyRecord> {
    let tree = XmlTree::parse(xml)?;
    let mut record = PropertyRecord::default();

    for property in CoreProperty::ALL {
        let Some(node) = tree.find_first(property.element()) else {
            continue;
        };
        let text = tree.text_content(node);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        let value = Some(text.to_string());
        match property {
            CoreProperty::Title => record.title = value,
            CoreProperty::Subject => record.subject = value,
            CoreProperty::Creator => record.creator = value,
            CoreProperty::Keywords => record.keywords = value,
            CoreProperty::LastModifiedBy => record.last_modified_by = value,
            CoreProperty::Revision => record.revision = value,
            CoreProperty::CreatedAt => record.created_at = parse_date(property, text),
            CoreProperty::UpdatedAt => record.updated_at = parse_date(property, text),
        }
    }

    Ok(record)
}

fn parse_date(property: CoreProperty, text: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(text) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            warn!("ignoring unparseable {property} value {text:?}: {e}");
            None
        }
    }
}

/// Normalize a millisecond timestamp to the W3CDTF form used by core.xml.
pub fn format_timestamp(property: CoreProperty, value: &str) -> Result<String> {
    let invalid = || Error::InvalidProperty {
        field: property.key().to_string(),
        value: value.to_string(),
    };
    let millis: i64 = value.trim().parse().map_err(|_| invalid())?;
    let dt = DateTime::from_timestamp_millis(millis).ok_or_else(invalid)?;
    Ok(dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

/// Rewrite the given fields of a `docProps/core.xml` part.
///
/// Every value is validated before anything changes; date fields must be
/// millisecond timestamps. Missing elements are appended to the root.
pub fn apply_properties(xml: &str, updates: &[(CoreProperty, String)]) -> Result<String> {
    let values = updates
        .iter()
        .map(|(property, value)| {
            let value = if property.is_date() {
                format_timestamp(*property, value)?
            } else {
                value.clone()
            };
            Ok((*property, value))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut tree = XmlTree::parse(xml)?;
    let root = tree
        .root_element()
        .ok_or_else(|| Error::Structure("core properties part has no root element".into()))?;

    for (property, value) in values {
        let node = match tree.find_first(property.element()) {
            Some(node) => node,
            None => {
                let attrs: &[(&str, &str)] = if property.is_date() {
                    &[("xsi:type", "dcterms:W3CDTF")]
                } else {
                    &[]
                };
                let node = tree.create_element(property.element(), attrs);
                tree.append_child(root, node);
                node
            }
        };
        tree.set_text(node, &value);
    }

    Ok(tree.to_xml())
}

/// Rewrite core properties of a container on disk.
///
/// The container is replaced atomically: the new package is written to a
/// temporary file next to the original and renamed over it.
pub fn write_properties<P: AsRef<Path>>(path: P, updates: &[(CoreProperty, String)]) -> Result<()> {
    let path = path.as_ref();
    let mut package = Package::open(path)?;
    let xml = apply_properties(&package.read_entry_as_text(CORE_PART)?, updates)?;
    package.add_entry(CORE_PART, xml);

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    package.write_to(temp.as_file_mut())?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    info!("updated {} core properties in {}", updates.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:title>Положение о закупках</dc:title><dc:creator>Иванов &amp; Co</dc:creator><cp:revision>3</cp:revision><dcterms:created xsi:type="dcterms:W3CDTF">2023-05-01T10:00:00Z</dcterms:created></cp:coreProperties>"#;

    #[test]
    fn test_parse_properties() {
        let record = parse_properties(CORE).unwrap();
        assert_eq!(record.title.as_deref(), Some("Положение о закупках"));
        assert_eq!(record.creator.as_deref(), Some("Иванов & Co"));
        assert_eq!(record.revision.as_deref(), Some("3"));
        assert_eq!(record.subject, None);
        assert_eq!(
            record.created_at.map(|d| d.to_rfc3339()),
            Some("2023-05-01T10:00:00+00:00".to_string())
        );
    }

    #[test]
    fn test_apply_updates_and_appends() {
        let xml = apply_properties(
            CORE,
            &[
                (CoreProperty::Title, "Новое название".to_string()),
                (CoreProperty::UpdatedAt, "1700000000000".to_string()),
            ],
        )
        .unwrap();

        assert!(xml.contains("<dc:title>Новое название</dc:title>"));
        assert!(xml.contains(
            r#"<dcterms:modified xsi:type="dcterms:W3CDTF">2023-11-14T22:13:20Z</dcterms:modified>"#
        ));
        assert!(xml.contains("<dc:creator>Иванов &amp; Co</dc:creator>"));
    }

    #[test]
    fn test_non_numeric_timestamp_is_rejected() {
        let err = apply_properties(
            CORE,
            &[
                (CoreProperty::Title, "ignored".to_string()),
                (CoreProperty::CreatedAt, "yesterday".to_string()),
            ],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidProperty { ref field, ref value } if field == "createdAt" && value == "yesterday"
        ));
    }

    #[test]
    fn test_record_updates_write_back_unchanged() {
        let record = parse_properties(CORE).unwrap();
        let updates = record.updates();
        assert_eq!(updates.len(), 4);

        let rewritten = apply_properties(CORE, &updates).unwrap();
        assert_eq!(parse_properties(&rewritten).unwrap(), record);
    }

    #[test]
    fn test_property_names() {
        assert_eq!("lastModifiedBy".parse::<CoreProperty>().unwrap(), CoreProperty::LastModifiedBy);
        assert_eq!("updated_at".parse::<CoreProperty>().unwrap(), CoreProperty::UpdatedAt);
        assert!("colour".parse::<CoreProperty>().is_err());
    }
}
