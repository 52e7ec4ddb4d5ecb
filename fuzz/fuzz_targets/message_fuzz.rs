//! Message fuzz target: decode, annotate and translate arbitrary text.
//! Nothing may panic, and every anchored annotation must translate back to its position.
//! Build with: cargo fuzz run message_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else { return };
    let text = hl7lens::normalize_terminators(s);
    let Ok(delims) = hl7lens::parse_delimiters(&text) else { return };
    for offset in 0..text.chars().count().min(256) {
        let p = hl7lens::position_at(&text, &delims, offset);
        if let Some(r) = hl7lens::range_at(&text, &delims, &p) {
            assert!(r.contains(offset));
        }
    }
    let version = hl7lens::VersionSpec::Highest;
    if let Ok((message, _)) = hl7lens::editor::get_structural_info(&text, &version) {
        for a in hl7lens::editor::get_annotations(&message, &text, &version, Some("x")) {
            if let Some(r) = a.range {
                assert_eq!(hl7lens::position_at(&text, &delims, r.start), a.position);
            }
            let _ = hl7lens::editor::resolve_path(&message, &a.position, "\n");
        }
        let _ = hl7lens::dump_locations(&message);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run message_fuzz");
}
