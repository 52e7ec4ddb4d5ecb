//! Message schema: description tables and per-version structural metadata.
//!
//! A schema is written in the schema DSL (see `grammar.pest`) and parsed by
//! [`parse_schema`](crate::parser::parse_schema). The crate embeds a built-in schema
//! covering a representative subset of HL7 v2.3 and v2.5; [`Schema::builtin`] parses it
//! once per process.
//!
//! Metadata is looked up by ordinal:
//!
//! - [`SegmentDef::field`]: field ordinal → (name, data type)
//! - [`CompositeDef::component`]: component/subcomponent ordinal → (name, data type)
//!
//! A data type is composite if the version defines a `composite` with that code and
//! primitive otherwise.

use crate::decode::Hl7Error;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;

const BUILTIN_SOURCE: &str = include_str!("../data/builtin.schema");

static BUILTIN: OnceCell<Arc<Schema>> = OnceCell::new();

/// Name and declared data type of a field, component or subcomponent.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementDef {
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone)]
pub struct CompositeDef {
    pub code: String,
    /// Index 0 is component 1.
    pub components: Vec<ElementDef>,
}

impl CompositeDef {
    pub fn component(&self, ordinal: u32) -> Option<&ElementDef> {
        element(&self.components, ordinal)
    }
}

#[derive(Debug, Clone)]
pub struct SegmentDef {
    pub code: String,
    /// Index 0 is field 1.
    pub fields: Vec<ElementDef>,
}

impl SegmentDef {
    pub fn field(&self, ordinal: u32) -> Option<&ElementDef> {
        element(&self.fields, ordinal)
    }
}

fn element(elements: &[ElementDef], ordinal: u32) -> Option<&ElementDef> {
    let index = usize::try_from(ordinal).ok()?.checked_sub(1)?;
    elements.get(index)
}

/// How often a structure item may occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Exactly once.
    Required,
    /// `?`
    Optional,
    /// `*`
    OptionalRepeating,
    /// `+`
    RequiredRepeating,
}

impl Cardinality {
    pub fn is_optional(self) -> bool {
        matches!(self, Cardinality::Optional | Cardinality::OptionalRepeating)
    }

    pub fn is_repeating(self) -> bool {
        matches!(self, Cardinality::OptionalRepeating | Cardinality::RequiredRepeating)
    }
}

/// One entry of a message structure: a segment or a nested group.
#[derive(Debug, Clone)]
pub enum StructureItem {
    Segment {
        code: String,
        cardinality: Cardinality,
    },
    Group {
        name: String,
        cardinality: Cardinality,
        items: Vec<StructureItem>,
    },
}

impl StructureItem {
    pub fn cardinality(&self) -> Cardinality {
        match self {
            StructureItem::Segment { cardinality, .. } | StructureItem::Group { cardinality, .. } => {
                *cardinality
            }
        }
    }

    /// True if an occurrence of this item can begin with segment `code`.
    pub fn starts_with(&self, code: &str) -> bool {
        match self {
            StructureItem::Segment { code: c, .. } => c == code,
            StructureItem::Group { items, .. } => items_start_with(items, code),
        }
    }
}

/// True if a sequence of items can begin with segment `code`: the first item, or any
/// later one reachable over optional items.
pub fn items_start_with(items: &[StructureItem], code: &str) -> bool {
    for item in items {
        if item.starts_with(code) {
            return true;
        }
        if !item.cardinality().is_optional() {
            return false;
        }
    }
    false
}

/// Abstract message structure (e.g. `ADT_A01`).
#[derive(Debug, Clone)]
pub struct StructureDef {
    pub name: String,
    pub items: Vec<StructureItem>,
}

/// Definitions for one HL7 version.
#[derive(Debug, Clone)]
pub struct VersionSchema {
    pub version: String,
    pub composites: HashMap<String, CompositeDef>,
    pub segments: HashMap<String, SegmentDef>,
    pub structures: HashMap<String, StructureDef>,
    /// `ADT_A04` → `ADT_A01`
    pub events: HashMap<String, String>,
}

impl VersionSchema {
    pub fn new(version: String) -> Self {
        VersionSchema {
            version,
            composites: HashMap::new(),
            segments: HashMap::new(),
            structures: HashMap::new(),
            events: HashMap::new(),
        }
    }

    pub fn segment(&self, code: &str) -> Option<&SegmentDef> {
        self.segments.get(code)
    }

    pub fn composite(&self, data_type: &str) -> Option<&CompositeDef> {
        self.composites.get(data_type)
    }

    pub fn structure(&self, name: &str) -> Option<&StructureDef> {
        self.structures.get(name)
    }

    /// Structure for a message: explicit structure (MSH-9.3) first, then the event map,
    /// then `CODE_EVENT`, then the bare message code (e.g. `ACK`).
    pub fn structure_for(&self, code: &str, trigger: &str, explicit: &str) -> Option<&StructureDef> {
        if let Some(s) = self.structure(explicit) {
            return Some(s);
        }
        let key = if trigger.is_empty() {
            code.to_string()
        } else {
            format!("{}_{}", code, trigger)
        };
        if let Some(s) = self.events.get(&key).and_then(|name| self.structure(name)) {
            return Some(s);
        }
        self.structure(&key).or_else(|| self.structure(code))
    }
}

/// Parsed schema: description tables plus version sections in source order.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub messages: HashMap<String, String>,
    pub segments: HashMap<String, String>,
    pub versions: Vec<VersionSchema>,
}

impl Schema {
    /// Parse and resolve schema DSL source.
    pub fn parse(source: &str) -> Result<Self, Hl7Error> {
        let schema = crate::parser::parse_schema(source).map_err(Hl7Error::Schema)?;
        schema.check().map_err(Hl7Error::Schema)?;
        Ok(schema)
    }

    /// The embedded schema, parsed on first use.
    pub fn builtin() -> Result<Arc<Schema>, Hl7Error> {
        BUILTIN
            .get_or_try_init(|| Schema::parse(BUILTIN_SOURCE).map(Arc::new))
            .cloned()
    }

    pub fn version(&self, version: &str) -> Option<&VersionSchema> {
        self.versions.iter().find(|v| v.version == version)
    }

    /// Highest version by numeric comparison of its dotted parts.
    pub fn newest(&self) -> Option<&VersionSchema> {
        self.versions
            .iter()
            .max_by_key(|v| version_key(&v.version))
    }

    /// Version identifiers defined by this schema, oldest first.
    pub fn version_names(&self) -> Vec<String> {
        let mut names: Vec<&VersionSchema> = self.versions.iter().collect();
        names.sort_by_key(|v| version_key(&v.version));
        names.into_iter().map(|v| v.version.clone()).collect()
    }

    pub fn message_description(&self, code: &str) -> Option<&str> {
        self.messages.get(code).map(String::as_str)
    }

    pub fn segment_description(&self, code: &str) -> Option<&str> {
        self.segments.get(code).map(String::as_str)
    }

    /// Semantic checks after parsing: unique versions, event targets exist.
    fn check(&self) -> Result<(), String> {
        for (i, v) in self.versions.iter().enumerate() {
            if self.versions[..i].iter().any(|o| o.version == v.version) {
                return Err(format!("Duplicate version section: {}", v.version));
            }
            for (event, target) in &v.events {
                if !v.structures.contains_key(target) {
                    return Err(format!(
                        "Event {} in version {} maps to unknown structure {}",
                        event, v.version, target
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Numeric sort key of a dotted version string (`"2.5.1"` → `[2, 5, 1]`).
pub fn version_key(version: &str) -> Vec<u32> {
    version
        .split('.')
        .map(|part| part.trim().parse().unwrap_or(0))
        .collect()
}
