//! Validation traversal: one pass over the message tree producing positioned annotations.
//!
//! ## Annotations
//!
//! - **Segment marker**: one per segment, at `(segment, 0, 0, 1, 1)`.
//! - **Non standard segment**: replaces the marker (as an error) when the parent group
//!   flags the segment code as unexpected.
//! - **Value match**: a primitive equal to the highlight value (case-insensitive). Rules
//!   are not applied to it.
//! - **Rule error**: the first failing rule for the primitive's declared type. The text is
//!   the rule description with `%s` replaced by the raw value.
//!
//! Annotations come out in traversal order: each segment's marker, then its primitives
//! in text order. Each range is computed from the raw text by
//! [`range_at`](crate::position::range_at); a position with no range keeps `range: None`.

use crate::decode::VersionSpec;
use crate::delimiters::DelimiterSet;
use crate::model::Message;
use crate::position::{range_at, CharRange, StructuralPosition};
use crate::rules::{context_for, rule_version};
use crate::walker::{primitives, segments};
use serde::Serialize;
use std::fmt;

pub const NON_STANDARD_SEGMENT: &str = "Non standard segment";

/// Kind of an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnnotationKind {
    Error,
    SegmentMarker,
    ValueMatch,
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationKind::Error => write!(f, "error"),
            AnnotationKind::SegmentMarker => write!(f, "segment"),
            AnnotationKind::ValueMatch => write!(f, "match"),
        }
    }
}

/// A positioned validation or highlight result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub position: StructuralPosition,
    /// Empty for markers and value matches.
    pub message: String,
    /// Inclusive character range in the text, `None` if the position cannot be anchored.
    pub range: Option<CharRange>,
    pub kind: AnnotationKind,
}

impl Annotation {
    pub fn is_error(&self) -> bool {
        self.kind == AnnotationKind::Error
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Some(r) => write!(f, "{} [{}] {}", self.position, r, self.kind)?,
            None => write!(f, "{} [-] {}", self.position, self.kind)?,
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

/// Walk `message` and annotate it against `text` (the text it was decoded from).
///
/// `highlight` of `None` or `""` disables value matching.
pub fn validate(
    message: &Message,
    text: &str,
    delims: &DelimiterSet,
    version: &VersionSpec,
    highlight: Option<&str>,
) -> Vec<Annotation> {
    let ctx = context_for(&rule_version(version, message));
    let highlight = highlight.filter(|h| !h.is_empty()).map(str::to_lowercase);
    let mut out = Vec::new();

    let mut push = |position: StructuralPosition, message: String, kind: AnnotationKind| {
        let range = range_at(text, delims, &position);
        out.push(Annotation { position, message, range, kind });
    };

    for seg in segments(message) {
        let position = StructuralPosition::segment_start(seg.ordinal);
        if seg.parent.is_non_standard(&seg.segment.name) {
            push(position, NON_STANDARD_SEGMENT.to_string(), AnnotationKind::Error);
        } else {
            push(position, String::new(), AnnotationKind::SegmentMarker);
        }

        for p in primitives(message, seg.segment) {
            let position =
                StructuralPosition::new(seg.ordinal, p.field, p.repetition, p.component, p.subcomponent);
            if highlight.as_deref() == Some(p.value.to_lowercase().as_str()) {
                push(position, String::new(), AnnotationKind::ValueMatch);
                continue;
            }
            let Some(data_type) = p.data_type else { continue };
            let failed = ctx
                .rules_for(data_type)
                .iter()
                .find(|rule| !rule.check(&rule.correct(p.value)));
            if let Some(rule) = failed {
                push(position, rule.description().replace("%s", p.value), AnnotationKind::Error);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;
    use crate::delimiters::parse_delimiters;
    use crate::position::position_at;
    use crate::schema::Schema;

    const ADT: &str = "MSH|^~\\&|REG|HOSP|||20240101120000||ADT^A01|1|P|2.5\r\
EVN|A01|20240101\r\
PID|1||123||DOE^JOHN||19800101|M\r\
ZPI|custom\r\
PV1|1|I";

    fn run(text: &str, highlight: Option<&str>) -> Vec<Annotation> {
        let delims = parse_delimiters(text).expect("delimiters");
        let msg = decode(text, &VersionSpec::Default, Schema::builtin().expect("schema")).expect("decode");
        validate(&msg, text, &delims, &VersionSpec::Default, highlight)
    }

    #[test]
    fn marker_per_segment_and_non_standard_error() {
        let ann = run(ADT, None);
        let segs: Vec<_> = ann.iter().filter(|a| a.position.field == 0).collect();
        assert_eq!(segs.len(), 5);
        assert_eq!(segs[3].kind, AnnotationKind::Error);
        assert_eq!(segs[3].message, NON_STANDARD_SEGMENT);
        assert_eq!(segs[3].position, StructuralPosition::segment_start(4));
        assert!(segs.iter().enumerate().all(|(i, a)| i == 3 || a.kind == AnnotationKind::SegmentMarker));
        // a valid message has no other errors
        assert_eq!(ann.iter().filter(|a| a.is_error()).count(), 1);
    }

    #[test]
    fn rule_error_quotes_raw_value() {
        let text = ADT.replace("19800101", "1980-01-01");
        let ann = run(&text, None);
        let err = ann
            .iter()
            .find(|a| a.is_error() && a.position.field == 7)
            .expect("PID-7 error");
        assert_eq!(err.position, StructuralPosition::new(3, 7, 0, 1, 1));
        assert!(err.message.contains("'1980-01-01'"), "{}", err.message);
        let start = err.range.expect("range").start;
        assert_eq!(position_at(&text, &DelimiterSet::default(), start), err.position);
    }

    #[test]
    fn highlight_wins_over_rules() {
        let text = ADT.replace("19800101", "bad-date");
        let ann = run(&text, Some("BAD-DATE"));
        let at = StructuralPosition::new(3, 7, 0, 1, 1);
        let hits: Vec<_> = ann.iter().filter(|a| a.position == at).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, AnnotationKind::ValueMatch);
        assert!(hits[0].message.is_empty());
    }

    #[test]
    fn empty_highlight_matches_nothing() {
        let ann = run(ADT, Some(""));
        assert!(ann.iter().all(|a| a.kind != AnnotationKind::ValueMatch));
    }

    #[test]
    fn validation_is_idempotent() {
        assert_eq!(run(ADT, Some("doe")), run(ADT, Some("doe")));
    }
}
