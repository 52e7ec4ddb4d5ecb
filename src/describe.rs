//! Human-readable descriptions and paths for structural positions.

use crate::model::{Message, Segment};
use crate::position::StructuralPosition;
use crate::walker::{ordinal_of, segment_at, segments, Node, Structures};
use serde::Serialize;
use std::fmt::Write;

const UNKNOWN: &str = "unknown";

/// Path, value and description of one position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedPath {
    /// `/GROUP/SEG(1)-5(2)-1-2` style path.
    pub path: String,
    /// Raw value at the position, empty for a whole segment or a missing value.
    pub value: String,
    pub description: String,
}

/// Describe `position` inside `segment`, one line per level, lines joined by `sep`.
///
/// Levels below the segment are added only while the schema resolves them; the first
/// level that does not resolve is reported as `Unknown` (components and subcomponents
/// only past ordinal 1) and ends the description.
pub fn describe(message: &Message, segment: &Segment, position: &StructuralPosition, sep: &str) -> String {
    let mut lines = vec![
        format!(
            "Message: {} [{}]",
            message.schema.message_description(&message.code).unwrap_or(UNKNOWN),
            message.structure
        ),
        format!(
            "Segment {}: {}",
            segment.name,
            message.schema.segment_description(&segment.name).unwrap_or(UNKNOWN)
        ),
    ];
    if position.field > 0 {
        describe_elements(message, segment, position, &mut lines);
    }
    lines.join(sep)
}

fn describe_elements(message: &Message, segment: &Segment, position: &StructuralPosition, lines: &mut Vec<String>) {
    let (f, c, sc) = (position.field, position.component, position.subcomponent);
    let Some(field) = message.segment_def(&segment.name).and_then(|d| d.field(f)) else {
        tracing::debug!(segment = %segment.name, field = f, "field not declared");
        lines.push(format!("Field {}: Unknown", f));
        return;
    };
    lines.push(format!("Field {}: {} [{}]", f, field.name, field.data_type));

    let Some(component) = message.composite(&field.data_type).and_then(|d| d.component(c)) else {
        if c > 1 {
            lines.push(format!("Component {}: Unknown", c));
        }
        return;
    };
    lines.push(format!("Component {}: {} [{}]", c, component.name, component.data_type));

    match message.composite(&component.data_type).and_then(|d| d.component(sc)) {
        Some(sub) => lines.push(format!("Subcomponent {}: {} [{}]", sc, sub.name, sub.data_type)),
        None if sc > 1 => lines.push(format!("Subcomponent {}: Unknown", sc)),
        None => {}
    }
}

/// Path, value and description for `position`. A segment ordinal past the end of the
/// message gives an empty result.
pub fn resolve_path(message: &Message, position: &StructuralPosition, sep: &str) -> ResolvedPath {
    let Some(seg) = segment_at(message, position.segment) else {
        tracing::warn!(position = %position, "no segment with this ordinal");
        return ResolvedPath::default();
    };
    let mut path = seg.location.to_string();
    let mut value = String::new();
    if position.field > 0 {
        let _ = write!(path, "-{}", position.field);
        if position.repetition > 0 {
            let _ = write!(path, "({})", position.repetition);
        }
        if position.component > 1 || position.subcomponent > 1 {
            let _ = write!(path, "-{}", position.component);
            if position.subcomponent > 1 {
                let _ = write!(path, "-{}", position.subcomponent);
            }
        }
        value = seg
            .segment
            .value_at(position.field, position.repetition, position.component, position.subcomponent)
            .unwrap_or("")
            .to_string();
    }
    ResolvedPath {
        path,
        value,
        description: describe(message, seg.segment, position, sep),
    }
}

/// Inverse of [`resolve_path`]: parse `/LOC/SEG(n)-f(r)-c-s` (or a bare `SEG(n)-f...`) and
/// return its position. Missing levels default to the start of the element.
pub fn position_for_path(message: &Message, path: &str) -> Option<StructuralPosition> {
    let path = path.trim();
    let (segment_part, indices) = match path.find('-') {
        Some(i) => (&path[..i], Some(&path[i + 1..])),
        None => (path, None),
    };

    let segment = if segment_part.starts_with('/') {
        segments(message).find(|s| s.location.to_string() == segment_part)
    } else {
        let (name, rep) = split_rep(segment_part)?;
        segments(message).find(|s| s.segment.name == name && s.segment.rep == rep)
    };
    let Some(segment) = segment else {
        tracing::debug!(path, "no segment at path");
        return None;
    };
    let ordinal = ordinal_of(message, segment.segment)?;

    let mut position = StructuralPosition::segment_start(ordinal);
    if let Some(indices) = indices {
        let mut parts = indices.split('-');
        let (field, rep) = split_rep(parts.next()?)?;
        position.field = field.parse().ok()?;
        position.repetition = rep;
        if let Some(c) = parts.next() {
            position.component = c.parse().ok()?;
        }
        if let Some(sc) = parts.next() {
            position.subcomponent = sc.parse().ok()?;
        }
        if parts.next().is_some() || position.field == 0 || position.component == 0 || position.subcomponent == 0 {
            return None;
        }
    }
    Some(position)
}

/// `NAME(3)` → (`NAME`, 3); `NAME` → (`NAME`, 0).
fn split_rep(s: &str) -> Option<(&str, u32)> {
    match s.find('(') {
        Some(open) => {
            let rep = s[open + 1..].strip_suffix(')')?.parse().ok()?;
            Some((&s[..open], rep))
        }
        None => Some((s, 0)),
    }
}

/// Indented listing of every group and segment: locations, segment ordinals and
/// non-standard flags.
pub fn dump_locations(message: &Message) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", message.structure, message.profile.as_deref().unwrap_or("generic"));
    let mut ordinal = 0u32;
    for node in Structures::new(message) {
        match node {
            Node::Group { location, .. } => {
                let _ = writeln!(out, "{}{}", "  ".repeat(location.depth()), location);
            }
            Node::Segment { segment, parent, location } => {
                ordinal += 1;
                let flag = if parent.is_non_standard(&segment.name) { "  [non-standard]" } else { "" };
                let _ = writeln!(out, "{}{}  #{}{}", "  ".repeat(location.depth()), location, ordinal, flag);
            }
        }
    }
    out
}
