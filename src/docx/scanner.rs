//! Bookmark scanner.
//!
//! Bookmarks in WordprocessingML are empty marker elements
//! (`w:bookmarkStart` / `w:bookmarkEnd`) that do not nest with paragraphs:
//! a bookmark may start mid-paragraph and end several paragraphs later, or
//! sit between paragraphs at body level. The scanner recovers, for each
//! bookmark, the range of paragraph indices it covers by running a small
//! state machine over the paragraph and marker tokens in document order.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use log::debug;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;

use crate::error::Result;
use crate::xml::{NodeId, XmlTree, unescape_lossy};

use super::{BOOKMARK_END, BOOKMARK_START, PARAGRAPH};

/// Placeholder names: Cyrillic letters, digits, underscore and hyphen.
/// Anything else (`_GoBack`, `_Toc…`) is a system bookmark.
static PLACEHOLDER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[А-Яа-яЁё0-9_-]+$").expect("valid placeholder regex"));

/// Returns the name if it is usable as a splice placeholder.
pub fn placeholder_name(name: &str) -> Option<&str> {
    PLACEHOLDER_NAME.is_match(name).then_some(name)
}

/// A bookmark and the paragraph range it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub id: u32,
    /// Placeholder name; `None` for system bookmarks.
    pub name: Option<String>,
    /// Index of the first paragraph in range.
    pub start: usize,
    /// Index of the last paragraph in range (`>= start`).
    pub end: usize,
    /// The start marker sits inside a paragraph.
    pub paragraph_is_open_at_start: bool,
    /// The end marker sits inside a paragraph.
    pub paragraph_is_open_at_end: bool,
    /// The end marker sits inside a later paragraph than the start.
    pub end_in_other_paragraph: bool,
    /// The end marker sits in the start paragraph, or outside any paragraph.
    pub end_is_own_paragraph: bool,
    /// Always `end - start + 1`.
    pub count_paragraphs: usize,
}

impl Bookmark {
    pub fn is_placeholder(&self) -> bool {
        self.name.is_some()
    }

    /// Both markers sit between paragraphs at body level.
    pub fn is_global(&self) -> bool {
        !self.paragraph_is_open_at_start && !self.paragraph_is_open_at_end
    }

    /// Move the end of the range, keeping `count_paragraphs` in sync.
    pub fn set_end(&mut self, end: usize) {
        self.end = end.max(self.start);
        self.count_paragraphs = self.end - self.start + 1;
    }

    /// Shift the whole range by `delta` paragraphs.
    pub fn shift(&mut self, delta: isize) {
        self.start = self.start.saturating_add_signed(delta);
        self.set_end(self.end.saturating_add_signed(delta));
    }

    /// Record that the end marker now lives in the last paragraph of the range.
    pub fn end_moved_to_last_paragraph(&mut self) {
        self.paragraph_is_open_at_end = true;
        self.end_in_other_paragraph = self.end > self.start;
        self.end_is_own_paragraph = self.end == self.start;
    }
}

/// Bookmarks of one document keyed by numeric id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkIndex {
    map: BTreeMap<u32, Bookmark>,
}

impl BookmarkIndex {
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&Bookmark> {
        self.map.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Bookmark> {
        self.map.get_mut(&id)
    }

    pub fn insert(&mut self, bookmark: Bookmark) {
        self.map.insert(bookmark.id, bookmark);
    }

    pub fn remove(&mut self, id: u32) -> Option<Bookmark> {
        self.map.remove(&id)
    }

    /// Bookmarks in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Bookmark> {
        self.map.values()
    }

    /// Lowest-id bookmark carrying the given placeholder name.
    pub fn find_by_name(&self, name: &str) -> Option<&Bookmark> {
        self.map.values().find(|b| b.name.as_deref() == Some(name))
    }

    /// Placeholder bookmarks ordered by position.
    pub fn placeholders(&self) -> Vec<Bookmark> {
        let mut marks: Vec<_> = self.map.values().filter(|b| b.is_placeholder()).cloned().collect();
        marks.sort_by_key(|b| (b.start, b.id));
        marks
    }

    /// Shift every bookmark starting at or after paragraph `from` by `delta`.
    pub fn shift_from(&mut self, from: usize, delta: isize) {
        for bookmark in self.map.values_mut() {
            if bookmark.start >= from {
                bookmark.shift(delta);
            }
        }
    }

    /// Resize bookmark `id` to cover `count` paragraphs and re-index the rest.
    ///
    /// Bookmarks after the old end move by the size delta. Bookmarks that
    /// started inside the replaced tail are dropped since their paragraphs
    /// no longer exist. Enclosing bookmarks keep their start and move their
    /// end; one whose end sat in the replaced tail is clamped to the last
    /// paragraph of the new range, where the caller re-creates its end
    /// marker. Returns the size delta.
    pub fn resize(&mut self, id: u32, count: usize) -> isize {
        let Some(target) = self.map.get(&id) else {
            return 0;
        };
        let (start, old_end) = (target.start, target.end);
        let new_end = start + count.max(1) - 1;
        let delta = new_end as isize - old_end as isize;

        self.map.retain(|&other, b| {
            let inside_tail = b.start > start && b.start <= old_end;
            other == id || !inside_tail
        });

        for bookmark in self.map.values_mut() {
            if bookmark.id == id {
                bookmark.set_end(new_end);
            } else if bookmark.start > old_end {
                bookmark.shift(delta);
            } else if bookmark.end > old_end {
                bookmark.set_end(bookmark.end.saturating_add_signed(delta));
            } else if bookmark.end > start {
                bookmark.set_end(new_end);
                bookmark.end_moved_to_last_paragraph();
            }
        }

        delta
    }
}

impl FromIterator<Bookmark> for BookmarkIndex {
    fn from_iter<I: IntoIterator<Item = Bookmark>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().map(|b| (b.id, b)).collect(),
        }
    }
}

/// Token classes the scanner cares about; everything else is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    ParagraphOpen,
    ParagraphClose,
    /// A self-closing `<w:p/>`.
    ParagraphEmpty,
    BookmarkStart { id: u32, name: Option<&'a str> },
    BookmarkEnd { id: u32 },
}

#[derive(Debug)]
struct Pending {
    name: Option<String>,
    start: usize,
    open_at_start: bool,
}

/// Incremental bookmark scanner.
#[derive(Debug, Default)]
pub struct Scanner {
    /// Paragraphs opened so far.
    paragraphs: usize,
    /// Indices of the paragraphs currently open, innermost last.
    open: Vec<usize>,
    pending: HashMap<u32, Pending>,
    done: BookmarkIndex,
}

impl Scanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, token: Token<'_>) {
        match token {
            Token::ParagraphOpen => {
                self.open.push(self.paragraphs);
                self.paragraphs += 1;
            }
            Token::ParagraphClose => {
                self.open.pop();
            }
            Token::ParagraphEmpty => self.paragraphs += 1,
            Token::BookmarkStart { id, name } => {
                let current = self.open.last().copied();
                self.pending.insert(
                    id,
                    Pending {
                        name: name.and_then(placeholder_name).map(str::to_string),
                        start: current.unwrap_or(self.paragraphs),
                        open_at_start: current.is_some(),
                    },
                );
            }
            Token::BookmarkEnd { id } => {
                let Some(pending) = self.pending.remove(&id) else {
                    debug!("bookmark end {id} has no matching start");
                    return;
                };
                let current = self.open.last().copied();
                let end = match current {
                    Some(index) => index,
                    None => self.paragraphs.saturating_sub(1),
                }
                .max(pending.start);

                self.done.insert(Bookmark {
                    id,
                    name: pending.name,
                    start: pending.start,
                    end,
                    paragraph_is_open_at_start: pending.open_at_start,
                    paragraph_is_open_at_end: current.is_some(),
                    end_in_other_paragraph: current.is_some_and(|index| index > pending.start),
                    end_is_own_paragraph: current.is_none_or(|index| index == pending.start),
                    count_paragraphs: end - pending.start + 1,
                });
            }
        }
    }

    pub fn finish(self) -> BookmarkIndex {
        for id in self.pending.keys() {
            debug!("bookmark {id} is never closed; ignoring it");
        }
        self.done
    }
}

/// Scan raw body XML.
pub fn scan(xml: &str) -> Result<BookmarkIndex> {
    let mut reader = Reader::from_str(xml);
    let mut scanner = Scanner::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => feed_start(&mut scanner, &e, false),
            Event::Empty(e) => feed_start(&mut scanner, &e, true),
            Event::End(e) if e.name().as_ref() == PARAGRAPH.as_bytes() => {
                scanner.feed(Token::ParagraphClose)
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(scanner.finish())
}

fn feed_start(scanner: &mut Scanner, e: &BytesStart, empty: bool) {
    let name = e.name();
    let name = name.as_ref();
    if name == PARAGRAPH.as_bytes() {
        scanner.feed(if empty {
            Token::ParagraphEmpty
        } else {
            Token::ParagraphOpen
        });
        return;
    }

    let is_start = name == BOOKMARK_START.as_bytes();
    if !is_start && name != BOOKMARK_END.as_bytes() {
        return;
    }

    let mut id = None;
    let mut label = None;
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"w:id" => id = String::from_utf8_lossy(&attr.value).trim().parse::<u32>().ok(),
            b"w:name" => {
                let raw = String::from_utf8_lossy(&attr.value).into_owned();
                label = Some(unescape_lossy(&raw).into_owned());
            }
            _ => {}
        }
    }

    let Some(id) = id else {
        debug!("bookmark marker without a numeric id");
        return;
    };
    if is_start {
        scanner.feed(Token::BookmarkStart {
            id,
            name: label.as_deref(),
        });
    } else {
        scanner.feed(Token::BookmarkEnd { id });
    }
}

/// Scan an already parsed tree. Paragraph indices agree with
/// [`paragraph_nodes`] on the same tree.
pub fn scan_tree(tree: &XmlTree) -> BookmarkIndex {
    enum Step {
        Enter(NodeId),
        Leave,
    }

    let mut scanner = Scanner::new();
    let mut stack: Vec<Step> = tree.roots().iter().rev().map(|&r| Step::Enter(r)).collect();

    while let Some(step) = stack.pop() {
        let id = match step {
            Step::Enter(id) => id,
            Step::Leave => {
                scanner.feed(Token::ParagraphClose);
                continue;
            }
        };
        match tree.name(id) {
            Some(PARAGRAPH) => {
                if tree.children(id).is_empty() {
                    scanner.feed(Token::ParagraphEmpty);
                    continue;
                }
                scanner.feed(Token::ParagraphOpen);
                stack.push(Step::Leave);
            }
            Some(BOOKMARK_START) => {
                if let Some(mark) = marker_id(tree, id) {
                    scanner.feed(Token::BookmarkStart {
                        id: mark,
                        name: tree.attr(id, "w:name"),
                    });
                }
            }
            Some(BOOKMARK_END) => {
                if let Some(mark) = marker_id(tree, id) {
                    scanner.feed(Token::BookmarkEnd { id: mark });
                }
            }
            _ => {}
        }
        stack.extend(tree.children(id).iter().rev().map(|&c| Step::Enter(c)));
    }

    scanner.finish()
}

/// Numeric `w:id` of a bookmark marker.
pub fn marker_id(tree: &XmlTree, id: NodeId) -> Option<u32> {
    tree.attr(id, "w:id")?.trim().parse().ok()
}

/// All paragraph elements in document order.
pub fn paragraph_nodes(tree: &XmlTree) -> Vec<NodeId> {
    tree.document_order()
        .into_iter()
        .filter(|&id| tree.is_element(id, PARAGRAPH))
        .collect()
}
