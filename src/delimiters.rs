//! Delimiter characters of a message, read from its header.
//!
//! The segment terminator is fixed (`'\r'`); the other four separators are taken from
//! fixed offsets of the first segment: `MSH|^~\&` gives field `|` (offset 3), component
//! `^` (4), repetition `~` (5) and subcomponent `&` (7). Offset 6 holds the escape
//! character, which is not a structural delimiter.

use crate::decode::Hl7Error;
use serde::Serialize;

/// Fixed segment terminator.
pub const SEGMENT_TERMINATOR: char = '\r';

/// Offset of the field separator in the header segment.
pub const FIELD_SEPARATOR_OFFSET: usize = 3;

const COMPONENT_OFFSET: usize = 4;
const REPETITION_OFFSET: usize = 5;
const SUBCOMPONENT_OFFSET: usize = 7;

/// Shortest header the delimiters can be read from (`MSH|^~\&`).
pub const MIN_HEADER_LEN: usize = SUBCOMPONENT_OFFSET + 1;

/// The five structural delimiters of one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DelimiterSet {
    pub segment: char,
    pub field: char,
    pub repetition: char,
    pub component: char,
    pub subcomponent: char,
}

impl Default for DelimiterSet {
    fn default() -> Self {
        DelimiterSet {
            segment: SEGMENT_TERMINATOR,
            field: '|',
            repetition: '~',
            component: '^',
            subcomponent: '&',
        }
    }
}

/// Read the delimiters from the start of `text`.
///
/// Fails with [`Hl7Error::MalformedHeader`] when the text is shorter than
/// [`MIN_HEADER_LEN`] characters or the header is cut short by a segment terminator.
pub fn parse_delimiters(text: &str) -> Result<DelimiterSet, Hl7Error> {
    let header: Vec<char> = text.chars().take(MIN_HEADER_LEN).collect();
    if header.len() < MIN_HEADER_LEN {
        return Err(Hl7Error::MalformedHeader { length: header.len() });
    }
    if let Some(cut) = header.iter().position(|&c| c == SEGMENT_TERMINATOR) {
        return Err(Hl7Error::MalformedHeader { length: cut });
    }
    Ok(DelimiterSet {
        segment: SEGMENT_TERMINATOR,
        field: header[FIELD_SEPARATOR_OFFSET],
        repetition: header[REPETITION_OFFSET],
        component: header[COMPONENT_OFFSET],
        subcomponent: header[SUBCOMPONENT_OFFSET],
    })
}

/// Replace every `'\n'` with the segment terminator, one character for one.
///
/// Offsets into the result are offsets into the input. A `"\r\n"` pair turns into an
/// empty segment, which is skipped by both the decoder and the position translator.
pub fn normalize_terminators(text: &str) -> String {
    text.replace('\n', "\r")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_standard_delimiters() {
        let d = parse_delimiters("MSH|^~\\&|APP").expect("delimiters");
        assert_eq!(d, DelimiterSet::default());
    }

    #[test]
    fn reads_custom_delimiters() {
        let d = parse_delimiters("MSH#*$\\%#X").expect("delimiters");
        assert_eq!(d.field, '#');
        assert_eq!(d.component, '*');
        assert_eq!(d.repetition, '$');
        assert_eq!(d.subcomponent, '%');
        assert_eq!(d.segment, '\r');
    }

    #[test]
    fn short_header_is_malformed() {
        match parse_delimiters("MSH|^~") {
            Err(Hl7Error::MalformedHeader { length }) => assert_eq!(length, 6),
            other => panic!("expected MalformedHeader, got {:?}", other),
        }
    }

    #[test]
    fn terminator_inside_header_is_malformed() {
        assert!(matches!(
            parse_delimiters("MSH|^~\r\\&|"),
            Err(Hl7Error::MalformedHeader { length: 6 })
        ));
    }

    #[test]
    fn normalize_keeps_offsets() {
        let text = "MSH|^~\\&\r\nPID|1\n";
        let n = normalize_terminators(text);
        assert_eq!(n.chars().count(), text.chars().count());
        assert_eq!(n, "MSH|^~\\&\r\rPID|1\r");
    }
}
