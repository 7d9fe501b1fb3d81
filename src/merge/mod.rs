//! Bookmark-driven document merging.
//!
//! A [`Merger`] holds the state of a host document: its body, the paragraph
//! list derived from it, its bookmark index and its relationship table.
//! Each child document is spliced in with [`Merger::splice_one`]: for every
//! placeholder bookmark the child shares with the host (matched by name),
//! the host's paragraph range is replaced by the child's.
//!
//! Paragraphs are addressed purely by index. Whenever a splice changes the
//! number of paragraphs in a range, the body is re-indexed and every later
//! bookmark is shifted by the same delta in a single pass
//! ([`BookmarkIndex::resize`]).

use std::collections::HashSet;

use log::{debug, warn};

use crate::docx::body::Body;
use crate::docx::rels::Relationships;
use crate::docx::scanner::{Bookmark, BookmarkIndex};
use crate::docx::{BOOKMARK_START, HYPERLINK};
use crate::error::{Error, Result};
use crate::util::time_seed_nanos;
use crate::xml::NodeId;


/// Where the host's closing marker ends up after a resizing splice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndMarkerPolicy {
    /// Remove every end marker of the bookmark and append one to the last
    /// paragraph of the new range.
    Relocate,
    /// Keep the first existing end marker and drop the others; append one to
    /// the last paragraph only if none is left.
    Prune,
}

impl EndMarkerPolicy {
    /// Pick the reconciliation rule from the end-marker locality of both sides.
    pub fn select(host: &Bookmark, child: &Bookmark) -> Self {
        let same_locality = host.end_in_other_paragraph == child.end_in_other_paragraph
            && host.end_is_own_paragraph == child.end_is_own_paragraph;
        if same_locality || !host.end_in_other_paragraph {
            EndMarkerPolicy::Relocate
        } else {
            EndMarkerPolicy::Prune
        }
    }
}

/// Generates relationship ids that cannot clash with the host table.
#[derive(Debug, Clone)]
struct RelIdAllocator {
    seed: u64,
    next: u64,
}

impl RelIdAllocator {
    fn new(seed: u64) -> Self {
        Self { seed, next: 1 }
    }

    fn fresh(&mut self, taken: &Relationships) -> String {
        loop {
            let id = format!("rIdW{:x}_{}", self.seed, self.next);
            self.next += 1;
            if !taken.contains(&id) {
                return id;
            }
        }
    }
}

/// Host document state while children are folded in.
#[derive(Debug, Clone)]
pub struct Merger {
    body: Body,
    bookmarks: BookmarkIndex,
    rels: Relationships,
    ids: RelIdAllocator,
}

impl Merger {
    /// Load the host document.
    ///
    /// Fails without touching anything if the body, its paragraphs, its
    /// bookmarks or its relationships are missing. Global bookmarks are then
    /// folded into the paragraphs that own them.
    pub fn load(body_xml: &str, rels_xml: &str) -> Result<Self> {
        Self::load_with_seed(body_xml, rels_xml, time_seed_nanos())
    }

    /// Like [`Merger::load`] with a fixed seed for generated relationship ids.
    pub fn load_with_seed(body_xml: &str, rels_xml: &str, seed: u64) -> Result<Self> {
        let mut body = Body::parse(body_xml)?;
        if body.paragraphs().is_empty() {
            return Err(Error::Structure("document has no paragraphs".into()));
        }
        let mut bookmarks = body.bookmarks();
        if bookmarks.is_empty() {
            return Err(Error::Structure("document has no bookmarks".into()));
        }
        let rels = Relationships::parse(rels_xml)?;
        if rels.is_empty() {
            return Err(Error::Structure("document has no relationships".into()));
        }

        fold_global_bookmarks(&mut body, &mut bookmarks);

        Ok(Self {
            body,
            bookmarks,
            rels,
            ids: RelIdAllocator::new(seed),
        })
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn bookmarks(&self) -> &BookmarkIndex {
        &self.bookmarks
    }

    pub fn relationships(&self) -> &Relationships {
        &self.rels
    }

    pub fn body_xml(&self) -> String {
        self.body.to_xml()
    }

    pub fn rels_xml(&self) -> String {
        self.rels.to_xml()
    }

    pub fn into_parts(self) -> (Body, Relationships) {
        (self.body, self.rels)
    }

    /// Splice children in list order. Each child sees the positions left
    /// behind by the previous ones.
    pub fn merge<'a, I>(&mut self, children: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (body, rels) in children {
            self.splice_one(body, rels)?;
        }
        Ok(())
    }

    /// Splice one child document into the host.
    ///
    /// Child placeholders without a namesake in the host are skipped.
    pub fn splice_one(&mut self, child_body: &str, child_rels: &str) -> Result<()> {
        let mut child = Body::parse(child_body)?;
        let child_rels = if child_rels.trim().is_empty() {
            Relationships::empty()
        } else {
            Relationships::parse(child_rels)?
        };
        let mut child_marks = child.bookmarks();
        fold_global_bookmarks(&mut child, &mut child_marks);

        let mut remapped = HashSet::new();
        for child_mark in child_marks.placeholders() {
            let Some(name) = child_mark.name.as_deref() else {
                continue;
            };
            let Some(host_mark) = self.bookmarks.find_by_name(name).cloned() else {
                debug!("child bookmark {name:?} has no placeholder in the host; skipping");
                continue;
            };

            self.remap_hyperlinks(&mut child, &child_rels, &child_mark, &mut remapped);
            if child_mark.count_paragraphs == host_mark.count_paragraphs {
                self.splice_equal(&child, &child_mark, &host_mark);
            } else {
                self.splice_resized(&child, &child_mark, &host_mark);
            }
        }

        Ok(())
    }

    /// Insert the superseded banner before all content.
    pub fn insert_banner(&mut self, text: &str) {
        self.body.prepend_text_paragraph(text);
        self.bookmarks.shift_from(0, 1);
    }

    /// Give every hyperlink in the child's range a fresh id and copy its
    /// relationship into the host table.
    fn remap_hyperlinks(
        &mut self,
        child: &mut Body,
        child_rels: &Relationships,
        mark: &Bookmark,
        remapped: &mut HashSet<NodeId>,
    ) {
        let links: Vec<NodeId> = (mark.start..=mark.end)
            .filter_map(|i| child.paragraph(i))
            .flat_map(|p| child.tree().descendants(p))
            .filter(|&n| child.tree().is_element(n, HYPERLINK))
            .collect();

        for link in links {
            if !remapped.insert(link) {
                continue;
            }
            let Some(old_id) = child.tree().attr(link, "r:id").map(str::to_string) else {
                continue;
            };
            let new_id = self.ids.fresh(&self.rels);
            if !self.rels.copy_from(child_rels, &old_id, &new_id) {
                warn!("hyperlink {old_id} has no relationship in the child document; unlinking it");
                child.tree_mut().remove_attr(link, "r:id");
                continue;
            }
            child.tree_mut().set_attr(link, "r:id", &new_id);
        }
    }

    fn splice_equal(&mut self, child: &Body, child_mark: &Bookmark, host_mark: &Bookmark) {
        for offset in 0..host_mark.count_paragraphs {
            let host = self.body.paragraph(host_mark.start + offset);
            let source = child.paragraph(child_mark.start + offset);
            if let (Some(host), Some(source)) = (host, source) {
                self.body.replace_content(host, child.tree(), source, true);
            }
        }
    }

    fn splice_resized(&mut self, child: &Body, child_mark: &Bookmark, host_mark: &Bookmark) {
        let (Some(first), Some(source_first)) = (
            self.body.paragraph(host_mark.start),
            child.paragraph(child_mark.start),
        ) else {
            return;
        };
        self.body
            .replace_content(first, child.tree(), source_first, false);

        let doomed: Vec<NodeId> = (host_mark.start + 1..=host_mark.end)
            .filter_map(|i| self.body.paragraph(i))
            .collect();
        // Enclosing bookmarks whose end marker goes away with the tail.
        let mut lost_ends: Vec<u32> = doomed
            .iter()
            .flat_map(|&p| self.body.end_marker_ids(p))
            .filter(|&id| id != host_mark.id)
            .filter(|&id| self.bookmarks.get(id).is_some_and(|b| b.start <= host_mark.start))
            .collect();
        lost_ends.sort_unstable();
        lost_ends.dedup();
        for paragraph in doomed {
            self.body.tree_mut().detach(paragraph);
        }

        let mut anchor = first;
        for index in child_mark.start + 1..=child_mark.end {
            let Some(source) = child.paragraph(index) else {
                continue;
            };
            let copy = self.body.tree_mut().import(child.tree(), source);
            self.body.strip_bookmark_markers(copy);
            self.body.tree_mut().insert_after(anchor, copy);
            anchor = copy;
        }

        self.body.reindex();
        self.bookmarks
            .resize(host_mark.id, child_mark.count_paragraphs);

        let policy = EndMarkerPolicy::select(host_mark, child_mark);
        self.reconcile_end_marker(host_mark.id, anchor, policy);
        for id in lost_ends {
            debug!("closing bookmark {id} at the end of the spliced range");
            self.body.append_bookmark_end(anchor, id);
        }
        if let Some(mark) = self.bookmarks.get_mut(host_mark.id) {
            mark.end_moved_to_last_paragraph();
        }
    }

    fn reconcile_end_marker(&mut self, id: u32, last: NodeId, policy: EndMarkerPolicy) {
        let ends = self.body.bookmark_ends(id);
        match policy {
            EndMarkerPolicy::Relocate => {
                for end in ends {
                    self.body.tree_mut().detach(end);
                }
                self.body.append_bookmark_end(last, id);
            }
            EndMarkerPolicy::Prune => {
                if ends.is_empty() {
                    self.body.append_bookmark_end(last, id);
                }
                for &end in ends.iter().skip(1) {
                    self.body.tree_mut().detach(end);
                }
            }
        }
    }
}

/// Fold bookmarks whose markers both sit between paragraphs into the
/// paragraphs they cover, so splicing only sees paragraph-scoped markers.
/// Unnamed ones, and ones with no paragraph to attach to, are removed.
fn fold_global_bookmarks(body: &mut Body, bookmarks: &mut BookmarkIndex) {
    let globals: Vec<Bookmark> = bookmarks.iter().filter(|b| b.is_global()).cloned().collect();

    for mark in globals {
        let markers = body.detached_markers(mark.id);
        let targets = (body.paragraph(mark.start), body.paragraph(mark.end));

        let (Some(first), Some(last), true) = (targets.0, targets.1, mark.is_placeholder()) else {
            debug!("dropping global bookmark {}", mark.id);
            for marker in markers {
                body.tree_mut().detach(marker);
            }
            bookmarks.remove(mark.id);
            continue;
        };

        for marker in markers {
            if body.tree().is_element(marker, BOOKMARK_START) {
                body.move_to_head(marker, first);
            } else {
                body.tree_mut().append_child(last, marker);
            }
        }

        if let Some(entry) = bookmarks.get_mut(mark.id) {
            entry.paragraph_is_open_at_start = true;
            entry.end_moved_to_last_paragraph();
        }
    }
}
