//! Integration tests: decode, annotate, and translate offsets/positions/paths end to end.

use hl7lens::editor::{
    available_versions, get_annotations, get_structural_info, position_for_offset, position_for_path,
    range_for_position, resolve_path,
};
use hl7lens::walker::segment_at;
use hl7lens::{normalize_terminators, AnnotationKind, Schema, StructuralPosition, VersionSpec};

const ORU: &str = "MSH|^~\\&|LAB|GENERAL HOSPITAL|EHR|GENERAL HOSPITAL|20240315083000||ORU^R01^ORU_R01|MSG00042|P|2.5\r\
PID|1||555-44-3333^^^GH&1.2.840.1&ISO^MR||SMITH^JANE^Q||19700412|F|||12 MAIN ST^^SPRINGFIELD^IL^62701\r\
PV1|1|O|CLINIC^101^A\r\
ORC|RE|PL1234|FL5678\r\
OBR|1|PL1234|FL5678|CBC^COMPLETE BLOOD COUNT^L|||20240315080000\r\
OBX|1|NM|WBC^LEUKOCYTES^L||6.2|10*3/uL|4.0-11.0|N|||F\r\
OBX|2|NM|HGB^HEMOGLOBIN^L||13.1|g/dL|12.0-16.0|N|||F\r\
NTE|1||Specimen slightly hemolyzed\r\
OBR|2|PL1235|FL5679|BMP^BASIC METABOLIC PANEL^L|||20240315080000\r\
OBX|1|NM|NA^SODIUM^L||139|mmol/L|135-145|N|||F";

const ADT: &str = "MSH|^~\\&|REG|HOSP|||20240101120000||ADT^A04|1|P|2.3\r\
EVN|A04|20240101120000\r\
PID|1||123||DOE^JOHN||19800101|M|||||555-1234\r\
ZPI|custom|data\r\
PV1|1|I";

fn char_offset(text: &str, needle: &str) -> usize {
    let byte = text.find(needle).expect("needle");
    text[..byte].chars().count()
}

#[test]
fn test_oru_decodes_into_groups() {
    let (message, delims) = get_structural_info(ORU, &VersionSpec::Default).expect("decode");
    assert_eq!(message.structure, "ORU_R01");
    assert_eq!(delims.field, '|');
    let obx = segment_at(&message, 7).expect("second OBX");
    assert_eq!(obx.segment.name, "OBX");
    assert_eq!(obx.location.to_string(), "/PATIENT_RESULT/ORDER_OBSERVATION/OBSERVATION(1)/OBX");
    let last = segment_at(&message, 10).expect("last OBX");
    assert_eq!(last.location.to_string(), "/PATIENT_RESULT/ORDER_OBSERVATION(1)/OBSERVATION/OBX");
    assert!(segment_at(&message, 11).is_none());
}

#[test]
fn test_valid_oru_has_only_markers() {
    let (message, _) = get_structural_info(ORU, &VersionSpec::Default).expect("decode");
    let annotations = get_annotations(&message, ORU, &VersionSpec::Default, None);
    assert_eq!(annotations.len(), 10);
    assert!(annotations.iter().all(|a| a.kind == AnnotationKind::SegmentMarker));
    assert!(annotations.iter().all(|a| a.message.is_empty()));
}

#[test]
fn test_every_anchored_annotation_translates_back() {
    let text = ADT.replace("19800101", "1980-01-01").replace("PV1|1|I", "PV1|x|I");
    let (message, delims) = get_structural_info(&text, &VersionSpec::Default).expect("decode");
    let annotations = get_annotations(&message, &text, &VersionSpec::Default, Some("doe"));
    assert!(annotations.iter().any(|a| a.is_error()));
    for a in &annotations {
        let range = a.range.expect("anchored");
        assert!(range.start <= range.end && range.end < text.chars().count());
        assert_eq!(position_for_offset(&text, &delims, range.start), a.position, "{}", a);
    }
}

#[test]
fn test_non_standard_segment_comes_before_its_fields() {
    let (message, _) = get_structural_info(ADT, &VersionSpec::Default).expect("decode");
    let annotations = get_annotations(&message, ADT, &VersionSpec::Default, Some("custom"));
    let zpi: Vec<_> = annotations.iter().filter(|a| a.position.segment == 4).collect();
    assert_eq!(zpi.len(), 2);
    assert_eq!(zpi[0].position, StructuralPosition::segment_start(4));
    assert_eq!(zpi[0].kind, AnnotationKind::Error);
    assert_eq!(zpi[0].message, "Non standard segment");
    assert_eq!(zpi[1].kind, AnnotationKind::ValueMatch);
    assert_eq!(zpi[1].position, StructuralPosition::new(4, 1, 0, 1, 1));
}

#[test]
fn test_highlight_is_case_insensitive_and_skips_rules() {
    let text = ADT.replace("19800101", "Unknown");
    let (message, _) = get_structural_info(&text, &VersionSpec::Default).expect("decode");
    let without = get_annotations(&message, &text, &VersionSpec::Default, None);
    let at = StructuralPosition::new(3, 7, 0, 1, 1);
    assert!(without.iter().any(|a| a.position == at && a.is_error()));
    let with = get_annotations(&message, &text, &VersionSpec::Default, Some("UNKNOWN"));
    let hits: Vec<_> = with.iter().filter(|a| a.position == at).collect();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].kind, AnnotationKind::ValueMatch);
}

#[test]
fn test_telephone_rule_follows_rule_version() {
    // PID-13 is XTN; its first component is TN up to 2.4 and ST afterwards.
    let text = ADT.replace("555-1234", "call me");
    let at = StructuralPosition::new(3, 13, 0, 1, 1);
    let (message, _) = get_structural_info(&text, &VersionSpec::Default).expect("decode");
    let v23 = get_annotations(&message, &text, &VersionSpec::Default, None);
    assert!(v23.iter().any(|a| a.position == at && a.is_error()));

    let (message, _) = get_structural_info(&text, &VersionSpec::Highest).expect("decode");
    let highest = get_annotations(&message, &text, &VersionSpec::Highest, None);
    assert!(highest.iter().all(|a| a.position != at));
}

#[test]
fn test_header_special_case() {
    let (_, delims) = get_structural_info(ORU, &VersionSpec::Default).expect("decode");
    assert_eq!(position_for_offset(ORU, &delims, 4), StructuralPosition::new(1, 2, 0, 1, 1));
    assert_eq!(position_for_offset(ORU, &delims, 5), StructuralPosition::new(1, 2, 0, 1, 1));
    assert_eq!(range_for_position(ORU, &delims, &StructuralPosition::new(1, 1, 0, 1, 1)), None);
}

#[test]
fn test_offset_to_description() {
    let (message, delims) = get_structural_info(ORU, &VersionSpec::Default).expect("decode");
    let offset = char_offset(ORU, "SPRINGFIELD");
    let position = position_for_offset(ORU, &delims, offset);
    assert_eq!(position, StructuralPosition::new(2, 11, 0, 3, 1));
    let resolved = resolve_path(&message, &position, "\n");
    assert_eq!(resolved.path, "/PATIENT_RESULT/PATIENT/PID-11-3");
    assert_eq!(resolved.value, "SPRINGFIELD");
    let lines: Vec<&str> = resolved.description.lines().collect();
    assert_eq!(lines[0], "Message: Unsolicited transmission of an observation [ORU_R01]");
    assert_eq!(lines[1], "Segment PID: Patient Identification");
    assert_eq!(lines[2], "Field 11: Patient Address [XAD]");
    assert_eq!(lines[3], "Component 3: City [ST]");
    assert_eq!(lines.len(), 4);
}

#[test]
fn test_paths_round_trip_for_fields() {
    let (message, delims) = get_structural_info(ORU, &VersionSpec::Default).expect("decode");
    for needle in ["GH&", "1.2.840.1", "JANE", "CLINIC", "PL1235", "g/dL", "139"] {
        let position = position_for_offset(ORU, &delims, char_offset(ORU, needle));
        let path = resolve_path(&message, &position, "\n").path;
        assert_eq!(position_for_path(&message, &path), Some(position), "{}", path);
    }
}

#[test]
fn test_ranges_are_idempotent() {
    let (_, delims) = get_structural_info(ORU, &VersionSpec::Default).expect("decode");
    let p = StructuralPosition::new(6, 5, 0, 1, 1);
    let a = range_for_position(ORU, &delims, &p);
    assert!(a.is_some());
    assert_eq!(a, range_for_position(ORU, &delims, &p));
}

#[test]
fn test_line_feeds_are_terminators() {
    let text = normalize_terminators(&ADT.replace('\r', "\r\n"));
    let (message, delims) = get_structural_info(&text, &VersionSpec::Default).expect("decode");
    let offset = char_offset(&text, "PV1");
    assert_eq!(position_for_offset(&text, &delims, offset), StructuralPosition::segment_start(5));
    assert_eq!(segment_at(&message, 5).map(|s| s.segment.name.as_str()), Some("PV1"));
}

#[test]
fn test_version_selectors() {
    let schema = Schema::builtin().expect("schema");
    let versions = available_versions(&schema);
    for v in &versions {
        let selector: VersionSpec = v.parse().expect("selector");
        let (message, _) = get_structural_info(ADT, &selector).expect("decode");
        assert_eq!(message.code, "ADT");
    }
    assert!(get_structural_info(ADT, &VersionSpec::Exact("2.9".into())).is_err());
}

#[test]
fn test_repeated_declared_segment_keeps_markers() {
    let text = "MSH|^~\\&|A|B|||20240101||ADT^A01|1|P|2.5\rEVN|A01\rPID|1\rPV1|1|I\rPID|2";
    let (message, _) = get_structural_info(text, &VersionSpec::Default).expect("decode");
    let annotations = get_annotations(&message, text, &VersionSpec::Default, None);
    let first_pid = annotations
        .iter()
        .find(|a| a.position == StructuralPosition::segment_start(3))
        .expect("first PID");
    assert_eq!(first_pid.kind, AnnotationKind::SegmentMarker);
    let second_pid = annotations
        .iter()
        .find(|a| a.position == StructuralPosition::segment_start(5))
        .expect("second PID");
    assert_eq!(second_pid.kind, AnnotationKind::SegmentMarker);
    assert!(annotations.iter().all(|a| !a.is_error()));
}
