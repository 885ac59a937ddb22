//! Text reconstruction: per-character expansion of the root text and
//! regrouping into styled paragraphs.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::crdt::sequence::toposort_weighted;
use crate::crdt::{CrdtId, CrdtSequence, CrdtSequenceItem, Lww, END_MARKER};
use crate::error::SceneError;
use crate::scene_items::{format_code, ParagraphStyle, Text, TextItem};

/// One position of the expanded character stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextChar {
    Char(char),
    Format(u32),
}

/// Splits every run into one item per character.
///
/// Character `i` of a run with id `(a, n)` gets id `(a, n + i)` and is
/// linked to its neighbours inside the run; the first and last keep the
/// run's own left and right ids.
///
/// Deleted runs carry no characters, so they are only split where another
/// item links into them. Each piece keeps its length in `deleted_length`
/// and [`ordered_chars`] weighs it by that length.
pub fn expand_text_items(items: &CrdtSequence<TextItem>) -> CrdtSequence<TextChar> {
    let mut linked = Links::default();
    for item in items.sequence_items() {
        linked.after.insert(item.left_id);
        linked.before.insert(item.right_id);
    }

    let mut out = CrdtSequence::new();
    for item in items.sequence_items() {
        if item.deleted_length > 0 {
            split_tombstone(item, &linked, &mut out);
            continue;
        }
        let values: Vec<TextChar> = match &item.value {
            Some(TextItem::Text(s)) => s.chars().map(TextChar::Char).collect(),
            Some(TextItem::Format(code)) => vec![TextChar::Format(*code)],
            None => Vec::new(),
        };
        if values.is_empty() {
            warn!(item = %item.item_id, "empty text item, links to it will dangle");
            continue;
        }
        let last = values.len() - 1;
        for (i, value) in values.into_iter().enumerate() {
            let i = i as u64;
            let item_id = item.item_id.tick(i);
            let left_id = if i == 0 { item.left_id } else { item.item_id.tick(i - 1) };
            let right_id =
                if i == last as u64 { item.right_id } else { item.item_id.tick(i + 1) };
            out.add(CrdtSequenceItem::new(item_id, left_id, right_id, 0, Some(value)));
        }
    }
    out
}

/// Ids named as someone's left neighbour (`after`) or right neighbour
/// (`before`).
#[derive(Default)]
struct Links {
    after: BTreeSet<CrdtId>,
    before: BTreeSet<CrdtId>,
}

fn split_tombstone(
    item: &CrdtSequenceItem<TextItem>,
    linked: &Links,
    out: &mut CrdtSequence<TextChar>,
) {
    let CrdtId { part1: author, part2: first } = item.item_id;
    let end = first.saturating_add(u64::from(item.deleted_length));
    let span = CrdtId::new(author, first)..CrdtId::new(author, end);

    // A piece starts at every linked id, and right after every id something
    // follows.
    let mut starts = BTreeSet::from([first]);
    starts.extend(linked.before.range(span.clone()).map(|id| id.part2));
    for id in linked.after.range(span) {
        starts.insert(id.part2);
        if id.part2 + 1 < end {
            starts.insert(id.part2 + 1);
        }
    }

    let starts: Vec<u64> = starts.into_iter().collect();
    for (j, &start) in starts.iter().enumerate() {
        let stop = starts.get(j + 1).copied().unwrap_or(end);
        let left_id = match j {
            0 => item.left_id,
            _ => CrdtId::new(author, starts[j - 1]),
        };
        let right_id = if stop == end { item.right_id } else { CrdtId::new(author, stop) };
        // Pieces are no longer than the run's own u32 length.
        let length = (stop - start) as u32;
        let piece = CrdtId::new(author, start);
        out.add(CrdtSequenceItem::new(piece, left_id, right_id, length, None));
    }
}

/// Expanded characters of `items` in logical order, tombstones included.
pub fn ordered_chars(
    items: &CrdtSequence<TextItem>,
) -> Result<Vec<CrdtSequenceItem<TextChar>>, SceneError> {
    let chars = expand_text_items(items);
    let ids = toposort_weighted(chars.sequence_items().map(|c| {
        let weight = if c.is_deleted() { u64::from(c.deleted_length) } else { 1 };
        (c.item_id, c.left_id, c.right_id, weight)
    }))?;
    Ok(ids.iter().filter_map(|id| chars.item(id).cloned()).collect())
}

// ── Paragraphs ──────────────────────────────────────────────────────────────

/// A run of characters sharing the same inline formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrdtStr {
    pub text: String,
    /// Id of every character of `text`, in order.
    pub ids: Vec<CrdtId>,
    pub bold: bool,
    pub italic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub contents: Vec<CrdtStr>,
    /// Id of the newline that opened the paragraph, or the sentinel for the
    /// first one.
    pub start_id: CrdtId,
    pub style: Lww<ParagraphStyle>,
}

impl Paragraph {
    /// Paragraph text without formatting.
    pub fn plain_text(&self) -> String {
        self.contents.iter().map(|s| s.text.as_str()).collect()
    }
}

/// The root text split into paragraphs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextDocument {
    pub paragraphs: Vec<Paragraph>,
}

impl TextDocument {
    pub fn from_text(text: &Text) -> Result<Self, SceneError> {
        let mut builder = Builder::new(text);
        for item in ordered_chars(&text.items)? {
            match item.value {
                None => {}
                Some(TextChar::Format(code)) => builder.format(code),
                Some(TextChar::Char('\n')) => builder.newline(item.item_id),
                Some(TextChar::Char(c)) => builder.char(item.item_id, c),
            }
        }
        Ok(TextDocument { paragraphs: builder.finish() })
    }
}

struct Builder<'t> {
    text: &'t Text,
    done: Vec<Paragraph>,
    start_id: CrdtId,
    style: Option<Lww<ParagraphStyle>>,
    contents: Vec<CrdtStr>,
    bold: bool,
    italic: bool,
}

impl<'t> Builder<'t> {
    fn new(text: &'t Text) -> Self {
        Self {
            text,
            done: Vec::new(),
            start_id: END_MARKER,
            style: text.styles.get(&END_MARKER).cloned(),
            contents: Vec::new(),
            bold: false,
            italic: false,
        }
    }

    fn format(&mut self, code: u32) {
        match code {
            format_code::BOLD_ON => self.bold = true,
            format_code::BOLD_OFF => self.bold = false,
            format_code::ITALIC_ON => self.italic = true,
            format_code::ITALIC_OFF => self.italic = false,
            other => debug!(code = other, "ignoring unknown format code"),
        }
    }

    fn char(&mut self, id: CrdtId, c: char) {
        if self.style.is_none() && self.contents.is_empty() {
            self.style = self.text.styles.get(&id).cloned();
        }
        match self.contents.last_mut() {
            Some(last) if last.bold == self.bold && last.italic == self.italic => {
                last.text.push(c);
                last.ids.push(id);
            }
            _ => self.contents.push(CrdtStr {
                text: c.to_string(),
                ids: vec![id],
                bold: self.bold,
                italic: self.italic,
            }),
        }
    }

    fn newline(&mut self, id: CrdtId) {
        self.close();
        self.start_id = id;
        self.style = self.text.styles.get(&id).cloned();
    }

    fn close(&mut self) {
        let style = self
            .style
            .take()
            .unwrap_or_else(|| Lww::new(END_MARKER, ParagraphStyle::Plain));
        self.done.push(Paragraph {
            contents: std::mem::take(&mut self.contents),
            start_id: self.start_id,
            style,
        });
        self.bold = false;
        self.italic = false;
    }

    fn finish(mut self) -> Vec<Paragraph> {
        self.close();
        self.done
    }
}

// ── Rendering ───────────────────────────────────────────────────────────────

impl fmt::Display for CrdtStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match (self.bold, self.italic) {
            (true, true) => "***",
            (true, false) => "**",
            (false, true) => "*",
            (false, false) => "",
        };
        write!(f, "{marker}{}{marker}", self.text)
    }
}

impl fmt::Display for Paragraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.style.value.prefix())?;
        for span in &self.contents {
            write!(f, "{span}")?;
        }
        Ok(())
    }
}

impl fmt::Display for TextDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, paragraph) in self.paragraphs.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{paragraph}")?;
        }
        Ok(())
    }
}
