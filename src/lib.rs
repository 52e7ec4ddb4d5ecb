//! # hl7lens: structural positions and validation annotations for HL7 v2 editors
//!
//! An editor showing a pipe-delimited HL7 v2 message needs to map between character
//! offsets and structural positions (segment / field / repetition / component /
//! subcomponent), describe what a position means, and underline problems. This crate
//! does that on top of a small schema-driven decoder.
//!
//! ## Pieces
//!
//! - **Delimiters** ([`delimiters`]): read the separators from the `MSH` header.
//! - **Translator** ([`position`]): offset → position and position → character range,
//!   by scanning the raw text. Works on text that does not decode.
//! - **Schema** ([`schema`], [`parser`]): per-version field/component metadata and
//!   message structures, written in a small DSL (pest grammar). A built-in schema covers
//!   a subset of v2.3 and v2.5.
//! - **Decoder** ([`decode`]): text → [`Message`] tree with segment groups; segments the
//!   structure does not expect are flagged non-standard.
//! - **Walker** ([`walker`]): document-order traversal, segment ordinals.
//! - **Descriptions** ([`describe`]): paths, values and readable descriptions.
//! - **Validation** ([`rules`], [`validate`]): primitive type rules per version and the
//!   annotation pass.
//! - **Editor facade** ([`editor`]): the operations an editor calls.
//!
//! ## Example
//!
//! ```
//! use hl7lens::{editor, StructuralPosition, VersionSpec};
//!
//! let text = "MSH|^~\\&|LAB|HOSP|||20240101||ORU^R01|1|P|2.5\rPID|1||123||DOE^JOHN";
//! let (message, delims) = editor::get_structural_info(text, &VersionSpec::Default).unwrap();
//!
//! let offset = text.find("JOHN").unwrap();
//! let position = editor::position_for_offset(text, &delims, offset);
//! assert_eq!(position, StructuralPosition::new(2, 5, 0, 2, 1));
//!
//! let resolved = editor::resolve_path(&message, &position, "\n");
//! assert_eq!(resolved.path, "/PATIENT_RESULT/PATIENT/PID-5-2");
//! assert_eq!(resolved.value, "JOHN");
//!
//! let annotations = editor::get_annotations(&message, text, &VersionSpec::Default, Some("doe"));
//! assert!(annotations.iter().all(|a| !a.is_error()));
//! ```
//!
//! Offsets are character offsets, not byte offsets. See `tests/integration.rs` for more.

pub mod decode;
pub mod delimiters;
pub mod describe;
pub mod editor;
pub mod model;
pub mod parser;
pub mod position;
pub mod rules;
pub mod schema;
pub mod validate;
pub mod walker;

pub use decode::{decode, Hl7Error, VersionSpec};
pub use delimiters::{normalize_terminators, parse_delimiters, DelimiterSet};
pub use describe::{describe, dump_locations, resolve_path, ResolvedPath};
pub use model::{Group, Location, Message, Segment};
pub use parser::parse_schema;
pub use position::{position_at, range_at, CharRange, StructuralPosition};
pub use schema::Schema;
pub use validate::{validate, Annotation, AnnotationKind};
pub use walker::{ordinal_of, segment_at, SegmentRef};
