//! Decoded message tree (structural representation).
//!
//! Nodes own their text; nothing borrows from the source message or the schema, so a
//! [`Message`] can outlive both.

use crate::delimiters::DelimiterSet;
use crate::schema::{CompositeDef, Schema, SegmentDef, VersionSchema};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A decoded message: header facts, the schema profile it was decoded against, and the
/// root group.
#[derive(Debug, Clone)]
pub struct Message {
    /// MSH-9.1, e.g. `ADT`.
    pub code: String,
    /// MSH-9.2, e.g. `A01`. May be empty.
    pub trigger: String,
    /// Structure the segments were matched against (`ADT_A01`, or `GENERIC` when none applied).
    pub structure: String,
    /// MSH-12 as written in the message (may be empty).
    pub declared_version: String,
    /// Schema version used for metadata, `None` for a generic decode.
    pub profile: Option<String>,
    pub schema: Arc<Schema>,
    pub delimiters: DelimiterSet,
    pub root: Group,
}

impl Message {
    pub fn version_schema(&self) -> Option<&VersionSchema> {
        self.profile.as_deref().and_then(|v| self.schema.version(v))
    }

    pub fn segment_def(&self, code: &str) -> Option<&SegmentDef> {
        self.version_schema()?.segment(code)
    }

    /// Composite definition of `data_type`, `None` if primitive or no profile.
    pub fn composite(&self, data_type: &str) -> Option<&CompositeDef> {
        self.version_schema()?.composite(data_type)
    }
}

/// Group instance (the message root is a group too).
#[derive(Debug, Clone, Default)]
pub struct Group {
    pub name: String,
    /// 0-based occurrence among siblings of the same name.
    pub rep: u32,
    pub children: Vec<Structure>,
    /// Codes of child segments the structure does not expect here.
    pub non_standard: BTreeSet<String>,
}

impl Group {
    pub fn new(name: impl Into<String>, rep: u32) -> Self {
        Group { name: name.into(), rep, ..Default::default() }
    }

    pub fn is_non_standard(&self, code: &str) -> bool {
        self.non_standard.contains(code)
    }

    /// Occurrences of child `name` so far (used to number the next one).
    pub(crate) fn count_named(&self, name: &str) -> u32 {
        self.children.iter().filter(|c| c.name() == name).count() as u32
    }
}

#[derive(Debug, Clone)]
pub enum Structure {
    Segment(Segment),
    Group(Group),
}

impl Structure {
    pub fn name(&self) -> &str {
        match self {
            Structure::Segment(s) => &s.name,
            Structure::Group(g) => &g.name,
        }
    }

    pub fn rep(&self) -> u32 {
        match self {
            Structure::Segment(s) => s.rep,
            Structure::Group(g) => g.rep,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub name: String,
    /// 0-based occurrence among siblings of the same name.
    pub rep: u32,
    /// Index 0 is field 1. For MSH, field 1 holds the field separator itself.
    pub fields: Vec<Field>,
}

impl Segment {
    pub fn field(&self, ordinal: u32) -> Option<&Field> {
        let index = usize::try_from(ordinal).ok()?.checked_sub(1)?;
        self.fields.get(index)
    }

    /// Raw value at field/repetition/component/subcomponent (field, component and
    /// subcomponent 1-based, repetition 0-based).
    pub fn value_at(&self, field: u32, rep: u32, component: u32, subcomponent: u32) -> Option<&str> {
        let c = usize::try_from(component).ok()?.checked_sub(1)?;
        let sc = usize::try_from(subcomponent).ok()?.checked_sub(1)?;
        self.field(field)?
            .reps
            .get(rep as usize)?
            .components
            .get(c)?
            .subcomponents
            .get(sc)
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Field {
    pub reps: Vec<Repetition>,
}

impl Field {
    /// Field holding one uninterpreted value (MSH-1, MSH-2).
    pub fn literal(value: &str) -> Self {
        Field {
            reps: vec![Repetition {
                components: vec![Component { subcomponents: vec![value.to_string()] }],
            }],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Repetition {
    pub components: Vec<Component>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Component {
    pub subcomponents: Vec<String>,
}

/// Path of a node from the message root: `(name, repetition)` steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub steps: Vec<(String, u32)>,
}

impl Location {
    pub fn child(&self, name: &str, rep: u32) -> Location {
        let mut steps = self.steps.clone();
        steps.push((name.to_string(), rep));
        Location { steps }
    }

    pub fn depth(&self) -> usize {
        self.steps.len()
    }

    pub fn last(&self) -> Option<(&str, u32)> {
        self.steps.last().map(|(n, r)| (n.as_str(), *r))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, rep) in &self.steps {
            write!(f, "/{}", name)?;
            if *rep > 0 {
                write!(f, "({})", rep)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg() -> Segment {
        Segment {
            name: "PID".into(),
            rep: 0,
            fields: vec![
                Field::literal("1"),
                Field {
                    reps: vec![
                        Repetition {
                            components: vec![
                                Component { subcomponents: vec!["DOE".into()] },
                                Component { subcomponents: vec!["JOHN".into(), "J".into()] },
                            ],
                        },
                        Repetition { components: vec![Component { subcomponents: vec!["X".into()] }] },
                    ],
                },
            ],
        }
    }

    #[test]
    fn value_at_walks_all_levels() {
        let s = seg();
        assert_eq!(s.value_at(1, 0, 1, 1), Some("1"));
        assert_eq!(s.value_at(2, 0, 2, 2), Some("J"));
        assert_eq!(s.value_at(2, 1, 1, 1), Some("X"));
        assert_eq!(s.value_at(2, 1, 2, 1), None);
        assert_eq!(s.value_at(0, 0, 1, 1), None);
        assert_eq!(s.value_at(3, 0, 1, 1), None);
        assert_eq!(s.value_at(2, 0, 0, 1), None);
    }

    #[test]
    fn location_renders_reps_above_zero() {
        let loc = Location::default()
            .child("PATIENT_RESULT", 0)
            .child("ORDER_OBSERVATION", 1)
            .child("OBX", 2);
        assert_eq!(loc.to_string(), "/PATIENT_RESULT/ORDER_OBSERVATION(1)/OBX(2)");
        assert_eq!(loc.depth(), 3);
        assert_eq!(loc.last(), Some(("OBX", 2)));
        assert_eq!(Location::default().to_string(), "");
    }
}
