//! Offset ↔ structural position translation over raw message text.
//!
//! Both directions run the same left-to-right state machine (`Scanner`) over the
//! characters of the text, counting delimiters. No parsed tree is involved, so the
//! translation keeps working on messages the decoder rejects.
//!
//! ## Counting rules
//!
//! | Character | Effect |
//! |-----------|--------|
//! | segment terminator | segment + 1 (only if the closed segment had content); field/rep/comp/sub reset to 0/0/1/1 |
//! | field separator | field + 1; rep/comp/sub reset |
//! | repetition separator | rep + 1; comp/sub reset |
//! | component separator | comp + 1; sub reset |
//! | subcomponent separator | sub + 1 |
//!
//! ## Header special case
//!
//! In a text starting with `MSH`, the field separator at offset 3 is at the same time
//! the separator and the literal value of MSH-1, so it advances the field ordinal twice
//! (offset 4 reports MSH-2). The characters of MSH-2 up to the next field separator are
//! the encoding characters themselves and are not counted as delimiters. MSH-1 is never
//! reported, and [`range_at`] of MSH-1 is `None`.
//!
//! Positions are nondecreasing along the scan, so each position occupies one contiguous
//! run of offsets: [`range_at`] returns that run and [`position_at`] of any offset inside
//! it gives the position back.

use crate::delimiters::{DelimiterSet, FIELD_SEPARATOR_OFFSET};
use serde::Serialize;
use std::fmt;

/// Segment code that triggers the header special case.
pub const HEADER_SEGMENT: &str = "MSH";

/// Structural address of a character: segment, field, repetition, component, subcomponent.
///
/// Ordering is lexicographic in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct StructuralPosition {
    /// 1-based; counts non-empty segments only.
    pub segment: u32,
    /// 0 = the segment itself.
    pub field: u32,
    /// 0-based.
    pub repetition: u32,
    /// 1-based.
    pub component: u32,
    /// 1-based.
    pub subcomponent: u32,
}

impl StructuralPosition {
    pub fn new(segment: u32, field: u32, repetition: u32, component: u32, subcomponent: u32) -> Self {
        StructuralPosition { segment, field, repetition, component, subcomponent }
    }

    /// The segment itself (field 0).
    pub fn segment_start(segment: u32) -> Self {
        StructuralPosition::new(segment, 0, 0, 1, 1)
    }
}

impl Default for StructuralPosition {
    fn default() -> Self {
        StructuralPosition::segment_start(1)
    }
}

impl fmt::Display for StructuralPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "s={} f={} r={} c={} sc={}",
            self.segment, self.field, self.repetition, self.component, self.subcomponent
        )
    }
}

/// Inclusive character range `[start, end]` in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CharRange {
    pub start: usize,
    pub end: usize,
}

impl CharRange {
    pub fn new(start: usize, end: usize) -> Self {
        CharRange { start, end }
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end
    }
}

impl fmt::Display for CharRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Delimiter-counting state machine shared by [`position_at`] and [`range_at`].
#[derive(Debug, Clone)]
pub(crate) struct Scanner<'d> {
    delims: &'d DelimiterSet,
    /// Character offset of the next character.
    index: usize,
    header: bool,
    pos: StructuralPosition,
    segment_has_content: bool,
    /// Inside MSH-2: only field separators and terminators count.
    literal: bool,
}

impl<'d> Scanner<'d> {
    /// Scanner positioned before the first character of `text`.
    pub(crate) fn new(text: &str, delims: &'d DelimiterSet) -> Self {
        Scanner {
            delims,
            index: 0,
            header: text.starts_with(HEADER_SEGMENT),
            pos: StructuralPosition::default(),
            segment_has_content: false,
            literal: false,
        }
    }

    /// Position of the character about to be consumed.
    pub(crate) fn position(&self) -> StructuralPosition {
        self.pos
    }

    /// Consume the next character.
    pub(crate) fn advance(&mut self, ch: char) {
        let d = self.delims;
        let index = self.index;
        self.index += 1;
        if ch == d.segment {
            if self.segment_has_content {
                self.pos.segment += 1;
            }
            self.pos.field = 0;
            self.reset_below_field();
            self.segment_has_content = false;
            self.literal = false;
            return;
        }
        self.segment_has_content = true;
        if self.header && index == FIELD_SEPARATOR_OFFSET {
            // Separator and MSH-1 value at once.
            self.pos.field += 2;
            self.reset_below_field();
            self.literal = true;
        } else if ch == d.field {
            self.pos.field += 1;
            self.reset_below_field();
            self.literal = false;
        } else if self.literal {
            // encoding characters
        } else if ch == d.repetition {
            self.pos.repetition += 1;
            self.pos.component = 1;
            self.pos.subcomponent = 1;
        } else if ch == d.component {
            self.pos.component += 1;
            self.pos.subcomponent = 1;
        } else if ch == d.subcomponent {
            self.pos.subcomponent += 1;
        }
    }

    fn reset_below_field(&mut self) {
        self.pos.repetition = 0;
        self.pos.component = 1;
        self.pos.subcomponent = 1;
    }
}

/// Structural position of the character at `offset` (a caret before that character).
///
/// Only the characters strictly before `offset` are scanned; offsets past the end are
/// clamped to the end of the text.
pub fn position_at(text: &str, delims: &DelimiterSet, offset: usize) -> StructuralPosition {
    let mut scanner = Scanner::new(text, delims);
    for ch in text.chars().take(offset) {
        scanner.advance(ch);
    }
    scanner.position()
}

/// Character range covered by `target`, or `None` if the position never occurs.
///
/// The range runs from the first character of the element to the delimiter that closes
/// it (or the last character of the text).
pub fn range_at(text: &str, delims: &DelimiterSet, target: &StructuralPosition) -> Option<CharRange> {
    if !text.chars().any(|c| c != delims.segment) {
        return None;
    }
    let mut scanner = Scanner::new(text, delims);
    let mut found: Option<CharRange> = None;
    for (i, ch) in text.chars().enumerate() {
        let current = scanner.position();
        if current == *target {
            match found.as_mut() {
                Some(range) => range.end = i,
                None => found = Some(CharRange::new(i, i)),
            }
        } else if found.is_some() || current > *target {
            break;
        }
        scanner.advance(ch);
    }
    if found.is_none() {
        tracing::debug!(position = %target, "position does not occur in text");
    }
    found
}
