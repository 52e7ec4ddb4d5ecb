//! Decode pipe-delimited message text into a [`Message`] tree.
//!
//! Segments are split on the segment terminator (empty segments skipped), fields are split
//! field → repetition → component → subcomponent, and segments are placed into groups by
//! matching them forward against the message structure from the schema.
//!
//! Segments the structure does not expect where they occur are attached to the innermost
//! open group. Their code is recorded in [`Group::non_standard`] unless that group's
//! structure declares it elsewhere.

use crate::delimiters::{parse_delimiters, DelimiterSet};
use crate::model::*;
use crate::position::HEADER_SEGMENT;
use crate::schema::{Schema, StructureItem};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Structure name used when no schema structure applies.
pub const GENERIC_STRUCTURE: &str = "GENERIC";

#[derive(Debug, thiserror::Error)]
pub enum Hl7Error {
    #[error("Malformed header: expected at least 8 header characters, found {length}")]
    MalformedHeader { length: usize },
    #[error("Parse failure: {0}")]
    ParseFailure(String),
    #[error("Schema: {0}")]
    Schema(String),
}

/// Which schema version to decode and validate against.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VersionSpec {
    /// Newest version the schema defines.
    Highest,
    /// Version declared in MSH-12.
    #[default]
    Default,
    /// No version: flat structure, no field metadata.
    Generic,
    Exact(String),
}

impl FromStr for VersionSpec {
    type Err = Hl7Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "" => Err(Hl7Error::ParseFailure("empty version selector".to_string())),
            "highest" => Ok(VersionSpec::Highest),
            "default" => Ok(VersionSpec::Default),
            "generic" => Ok(VersionSpec::Generic),
            _ => Ok(VersionSpec::Exact(s.to_string())),
        }
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Highest => write!(f, "Highest"),
            VersionSpec::Default => write!(f, "Default"),
            VersionSpec::Generic => write!(f, "Generic"),
            VersionSpec::Exact(v) => write!(f, "{}", v),
        }
    }
}

/// Decode `text` against `schema`.
pub fn decode(text: &str, version: &VersionSpec, schema: Arc<Schema>) -> Result<Message, Hl7Error> {
    let delimiters = parse_delimiters(text)?;
    if !text.starts_with(HEADER_SEGMENT) {
        return Err(Hl7Error::ParseFailure(format!(
            "message must start with {}",
            HEADER_SEGMENT
        )));
    }

    let mut segments = Vec::new();
    for (i, raw) in text.split(delimiters.segment).filter(|s| !s.is_empty()).enumerate() {
        let segment = if i == 0 {
            split_header(raw, &delimiters)
        } else {
            split_segment(raw, &delimiters)
        };
        check_segment_name(&segment.name, i + 1)?;
        segments.push(segment);
    }
    let header = segments
        .first()
        .ok_or_else(|| Hl7Error::ParseFailure("no segments".to_string()))?;

    let code = header.value_at(9, 0, 1, 1).unwrap_or("").to_string();
    if code.is_empty() {
        return Err(Hl7Error::ParseFailure("MSH-9 (message type) is missing".to_string()));
    }
    let trigger = header.value_at(9, 0, 2, 1).unwrap_or("").to_string();
    let explicit = header.value_at(9, 0, 3, 1).unwrap_or("").to_string();
    let declared_version = header.value_at(12, 0, 1, 1).unwrap_or("").to_string();

    let profile = match version {
        VersionSpec::Highest => schema.newest().map(|v| v.version.clone()),
        VersionSpec::Generic => None,
        VersionSpec::Default => {
            if declared_version.is_empty() {
                return Err(Hl7Error::ParseFailure("MSH-12 (version ID) is missing".to_string()));
            }
            Some(require_version(&schema, &declared_version)?)
        }
        VersionSpec::Exact(v) => Some(require_version(&schema, v)?),
    };

    let structure_def = profile
        .as_deref()
        .and_then(|v| schema.version(v))
        .and_then(|v| v.structure_for(&code, &trigger, &explicit));

    let (structure, root) = match structure_def {
        Some(def) => (def.name.clone(), match_structure(&def.name, &def.items, segments)),
        None => {
            tracing::debug!(code = %code, trigger = %trigger, "no structure for message, decoding flat");
            (GENERIC_STRUCTURE.to_string(), flat(segments))
        }
    };

    Ok(Message {
        code,
        trigger,
        structure,
        declared_version,
        profile,
        schema,
        delimiters,
        root,
    })
}

fn require_version(schema: &Schema, version: &str) -> Result<String, Hl7Error> {
    schema
        .version(version)
        .map(|v| v.version.clone())
        .ok_or_else(|| Hl7Error::ParseFailure(format!("unsupported version: {}", version)))
}

fn check_segment_name(name: &str, ordinal: usize) -> Result<(), Hl7Error> {
    let valid = name.len() == 3 && name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(Hl7Error::ParseFailure(format!(
            "invalid segment name {:?} in segment {}",
            name, ordinal
        )))
    }
}

/// First segment: MSH-1 is the field separator, MSH-2 is taken literally up to the next
/// field separator.
fn split_header(raw: &str, d: &DelimiterSet) -> Segment {
    let name = &raw[..HEADER_SEGMENT.len()];
    let rest = &raw[HEADER_SEGMENT.len() + d.field.len_utf8()..];
    let mut parts = rest.split(d.field);
    let mut fields = vec![Field::literal(&d.field.to_string())];
    fields.push(Field::literal(parts.next().unwrap_or("")));
    fields.extend(parts.map(|f| split_field(f, d)));
    Segment { name: name.to_string(), rep: 0, fields }
}

fn split_segment(raw: &str, d: &DelimiterSet) -> Segment {
    let mut parts = raw.split(d.field);
    let name = parts.next().unwrap_or("").to_string();
    let fields = parts.map(|f| split_field(f, d)).collect();
    Segment { name, rep: 0, fields }
}

fn split_field(raw: &str, d: &DelimiterSet) -> Field {
    Field {
        reps: raw
            .split(d.repetition)
            .map(|r| Repetition {
                components: r
                    .split(d.component)
                    .map(|c| Component {
                        subcomponents: c.split(d.subcomponent).map(String::from).collect(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

/// Generic decode: every segment directly under the root, nothing flagged.
fn flat(segments: Vec<Segment>) -> Group {
    let mut root = Group::new(GENERIC_STRUCTURE, 0);
    for mut segment in segments {
        segment.rep = root.count_named(&segment.name);
        root.children.push(Structure::Segment(segment));
    }
    root
}

/// Open group while matching: its structure items and the last item matched.
struct Frame<'s> {
    items: &'s [StructureItem],
    last: Option<usize>,
    group: Group,
}

/// Item of `items` that can take segment `code`: a new repetition of the last matched
/// item if it repeats, else the next item forward that starts with `code`.
fn find_item(items: &[StructureItem], last: Option<usize>, code: &str) -> Option<usize> {
    if let Some(l) = last {
        if items[l].cardinality().is_repeating() && items[l].starts_with(code) {
            return Some(l);
        }
    }
    let from = last.map_or(0, |l| l + 1);
    (from..items.len()).find(|&i| items[i].starts_with(code))
}

fn match_structure(name: &str, items: &[StructureItem], segments: Vec<Segment>) -> Group {
    let mut stack = vec![Frame { items, last: None, group: Group::new(name, 0) }];
    for segment in segments {
        let found = (0..stack.len())
            .rev()
            .find_map(|depth| find_item(stack[depth].items, stack[depth].last, &segment.name).map(|i| (depth, i)));
        match found {
            Some((depth, index)) => {
                while stack.len() > depth + 1 {
                    close_top(&mut stack);
                }
                place(&mut stack, index, segment);
            }
            None => {
                tracing::debug!(segment = %segment.name, "segment not expected by structure");
                if let Some(top) = stack.last_mut() {
                    push_unexpected(top, segment);
                }
            }
        }
    }
    while stack.len() > 1 {
        close_top(&mut stack);
    }
    stack.pop().map(|f| f.group).unwrap_or_default()
}

fn close_top(stack: &mut Vec<Frame<'_>>) {
    if let Some(frame) = stack.pop() {
        if let Some(parent) = stack.last_mut() {
            parent.group.children.push(Structure::Group(frame.group));
        }
    }
}

/// Put `segment` at item `index` of the top frame, opening nested groups down to it.
fn place<'s>(stack: &mut Vec<Frame<'s>>, index: usize, mut segment: Segment) {
    let Some(top) = stack.last_mut() else { return };
    top.last = Some(index);
    let items: &'s [StructureItem] = top.items;
    match &items[index] {
        StructureItem::Segment { .. } => {
            segment.rep = top.group.count_named(&segment.name);
            top.group.children.push(Structure::Segment(segment));
        }
        StructureItem::Group { name, items, .. } => {
            let rep = top.group.count_named(name);
            let inner = find_item(items, None, &segment.name);
            stack.push(Frame { items, last: None, group: Group::new(name.clone(), rep) });
            match inner {
                Some(i) => place(stack, i, segment),
                None => {
                    if let Some(top) = stack.last_mut() {
                        push_unexpected(top, segment);
                    }
                }
            }
        }
    }
}

/// Append a segment the matcher could not place. Its code is flagged non-standard only
/// when the frame's items never declare it; an out-of-place repeat of a declared code
/// stays unflagged.
fn push_unexpected(frame: &mut Frame<'_>, mut segment: Segment) {
    let declared = frame
        .items
        .iter()
        .any(|item| matches!(item, StructureItem::Segment { code, .. } if *code == segment.name));
    segment.rep = frame.group.count_named(&segment.name);
    if !declared {
        frame.group.non_standard.insert(segment.name.clone());
    }
    frame.group.children.push(Structure::Segment(segment));
}
