//! Operations an editor calls: decode, annotate, and translate between offsets, positions
//! and paths.
//!
//! All results are recomputed on every call. The only process-wide state is the
//! built-in schema and the validation-context cache.

use crate::decode::{decode, Hl7Error, VersionSpec};
use crate::delimiters::DelimiterSet;
use crate::describe::{self, ResolvedPath};
use crate::model::Message;
use crate::position::{position_at, range_at, CharRange, StructuralPosition};
use crate::schema::Schema;
use crate::validate::{validate, Annotation};
use tracing::instrument;

/// Decode `text` against the built-in schema.
#[instrument(level = "debug", skip(text), fields(chars = text.len()))]
pub fn get_structural_info(text: &str, version: &VersionSpec) -> Result<(Message, DelimiterSet), Hl7Error> {
    let message = decode(text, version, Schema::builtin()?)?;
    let delims = message.delimiters;
    Ok((message, delims))
}

/// Annotations for `message`, which must have been decoded from `text`.
#[instrument(level = "debug", skip(message, text), fields(structure = %message.structure))]
pub fn get_annotations(
    message: &Message,
    text: &str,
    version: &VersionSpec,
    highlight: Option<&str>,
) -> Vec<Annotation> {
    let annotations = validate(message, text, &message.delimiters, version, highlight);
    tracing::debug!(count = annotations.len(), "annotations");
    annotations
}

pub fn resolve_path(message: &Message, position: &StructuralPosition, separator: &str) -> ResolvedPath {
    describe::resolve_path(message, position, separator)
}

pub fn position_for_offset(text: &str, delims: &DelimiterSet, offset: usize) -> StructuralPosition {
    position_at(text, delims, offset)
}

pub fn range_for_position(text: &str, delims: &DelimiterSet, position: &StructuralPosition) -> Option<CharRange> {
    range_at(text, delims, position)
}

pub fn position_for_path(message: &Message, path: &str) -> Option<StructuralPosition> {
    describe::position_for_path(message, path)
}

/// Version choices for a selector: `Highest`, `Default`, `Generic`, then every version
/// the schema defines.
pub fn available_versions(schema: &Schema) -> Vec<String> {
    [VersionSpec::Highest, VersionSpec::Default, VersionSpec::Generic]
        .iter()
        .map(ToString::to_string)
        .chain(schema.version_names())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACK: &str = "MSH|^~\\&|A|B|C|D|20240101||ACK^A01|7|P|2.3\rMSA|AA|7";

    #[test]
    fn structural_info_and_offsets() {
        let (msg, delims) = get_structural_info(ACK, &VersionSpec::Default).expect("decode");
        assert_eq!(msg.structure, "ACK");
        let offset = ACK.find("AA").expect("AA");
        let p = position_for_offset(ACK, &delims, offset);
        assert_eq!(p, StructuralPosition::new(2, 1, 0, 1, 1));
        assert_eq!(range_for_position(ACK, &delims, &p), Some(CharRange::new(offset, offset + 2)));
        let resolved = resolve_path(&msg, &p, "\n");
        assert_eq!(resolved.path, "/MSA-1");
        assert_eq!(resolved.value, "AA");
        assert_eq!(position_for_path(&msg, &resolved.path), Some(p));
    }

    #[test]
    fn structural_info_reports_custom_delimiters() {
        let text = "MSH#*$\\%#A#B###20240101##ACK*A01#7#P#2.3\rMSA#AA#7";
        let (msg, delims) = get_structural_info(text, &VersionSpec::Default).expect("decode");
        assert_eq!(delims, msg.delimiters);
        assert_eq!(delims.field, '#');
        assert_eq!(delims.component, '*');
        assert_eq!(msg.code, "ACK");
    }

    #[test]
    fn errors_surface() {
        assert!(matches!(
            get_structural_info("MSH|", &VersionSpec::Default),
            Err(Hl7Error::MalformedHeader { length: 4 })
        ));
    }

    #[test]
    fn versions_list_selectors_first() {
        let schema = Schema::builtin().expect("schema");
        assert_eq!(available_versions(&schema), vec!["Highest", "Default", "Generic", "2.3", "2.5"]);
    }

    #[test]
    fn annotations_for_valid_ack() {
        let (msg, _) = get_structural_info(ACK, &VersionSpec::Default).expect("decode");
        let ann = get_annotations(&msg, ACK, &VersionSpec::Default, None);
        assert_eq!(ann.len(), 2);
        assert!(ann.iter().all(|a| !a.is_error()));
    }
}
