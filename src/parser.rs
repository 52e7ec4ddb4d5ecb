//! Parse schema DSL source into a [`Schema`] using PEST.

use crate::schema::*;
use pest::Parser;
use pest_derive::Parser as PestParser;
use std::collections::HashMap;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct SchemaParser;

/// Parse schema source. Only syntax and per-definition checks happen here; cross-references
/// are checked by [`Schema::parse`].
pub fn parse_schema(source: &str) -> Result<Schema, String> {
    let pairs = SchemaParser::parse(Rule::schema, source)
        .map_err(|e| format!("Parse error: {}", e))?;
    let pair = pairs.into_iter().next().ok_or("Empty parse")?;
    build_schema(pair)
}

fn build_schema(pair: pest::iterators::Pair<Rule>) -> Result<Schema, String> {
    let mut schema = Schema::default();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::messages_table => build_table(inner, &mut schema.messages)?,
            Rule::segments_table => build_table(inner, &mut schema.segments)?,
            Rule::version_section => schema.versions.push(build_version(inner)?),
            _ => {}
        }
    }
    Ok(schema)
}

fn build_table(pair: pest::iterators::Pair<Rule>, table: &mut HashMap<String, String>) -> Result<(), String> {
    for entry in pair.into_inner() {
        if entry.as_rule() != Rule::table_entry {
            continue;
        }
        let mut it = entry.into_inner();
        let code = it.next().ok_or("table entry: code")?.as_str().to_string();
        let text = parse_string(it.next().ok_or("table entry: description")?.as_str());
        if table.insert(code.clone(), text).is_some() {
            return Err(format!("Duplicate table entry: {}", code));
        }
    }
    Ok(())
}

fn build_version(pair: pest::iterators::Pair<Rule>) -> Result<VersionSchema, String> {
    let mut it = pair.into_inner();
    let name = parse_string(it.next().ok_or("version: missing name")?.as_str());
    if name.is_empty() {
        return Err("version: empty name".to_string());
    }
    let mut version = VersionSchema::new(name);
    for inner in it {
        match inner.as_rule() {
            Rule::composite_def => {
                let (code, components) = build_element_list(inner)?;
                let def = CompositeDef { code: code.clone(), components };
                if version.composites.insert(code.clone(), def).is_some() {
                    return Err(format!("Duplicate composite {} in version {}", code, version.version));
                }
            }
            Rule::segment_def => {
                let (code, fields) = build_element_list(inner)?;
                let def = SegmentDef { code: code.clone(), fields };
                if version.segments.insert(code.clone(), def).is_some() {
                    return Err(format!("Duplicate segment {} in version {}", code, version.version));
                }
            }
            Rule::structure_def => {
                let def = build_structure(inner)?;
                let name = def.name.clone();
                if version.structures.insert(name.clone(), def).is_some() {
                    return Err(format!("Duplicate structure {} in version {}", name, version.version));
                }
            }
            Rule::event_def => {
                let mut parts = inner.into_inner();
                let event = parts.next().ok_or("event: name")?.as_str().to_string();
                let target = parts.next().ok_or("event: structure")?.as_str().to_string();
                if version.events.insert(event.clone(), target).is_some() {
                    return Err(format!("Duplicate event {} in version {}", event, version.version));
                }
            }
            _ => {}
        }
    }
    Ok(version)
}

/// Shared body of `composite` and `segment`: a code followed by ordinal-numbered elements.
fn build_element_list(pair: pest::iterators::Pair<Rule>) -> Result<(String, Vec<ElementDef>), String> {
    let mut it = pair.into_inner();
    let code = it.next().ok_or("definition: missing code")?.as_str().to_string();
    let mut elements = Vec::new();
    for element in it {
        if element.as_rule() != Rule::element_def {
            continue;
        }
        let mut parts = element.into_inner();
        let ordinal: usize = parts
            .next()
            .ok_or("element: ordinal")?
            .as_str()
            .parse()
            .map_err(|_| "element: ordinal number")?;
        let data_type = parts.next().ok_or("element: data type")?.as_str().to_string();
        let name = parse_string(parts.next().ok_or("element: name")?.as_str());
        if ordinal != elements.len() + 1 {
            return Err(format!(
                "{}: element {} out of order (expected {})",
                code,
                ordinal,
                elements.len() + 1
            ));
        }
        elements.push(ElementDef { name, data_type });
    }
    Ok((code, elements))
}

fn build_structure(pair: pest::iterators::Pair<Rule>) -> Result<StructureDef, String> {
    let mut it = pair.into_inner();
    let name = it.next().ok_or("structure: missing name")?.as_str().to_string();
    let items = build_items(it)?;
    if items.is_empty() {
        return Err(format!("structure {} has no items", name));
    }
    Ok(StructureDef { name, items })
}

fn build_items(pairs: pest::iterators::Pairs<Rule>) -> Result<Vec<StructureItem>, String> {
    pairs
        .filter(|p| p.as_rule() == Rule::structure_item)
        .map(build_item)
        .collect()
}

fn build_item(pair: pest::iterators::Pair<Rule>) -> Result<StructureItem, String> {
    let inner = pair.into_inner().next().ok_or("empty structure_item")?;
    match inner.as_rule() {
        Rule::segment_item => {
            let mut parts = inner.into_inner();
            let code = parts.next().ok_or("segment item: code")?.as_str().to_string();
            let cardinality = parse_cardinality(parts.next())?;
            Ok(StructureItem::Segment { code, cardinality })
        }
        Rule::group_item => {
            let mut parts = inner.into_inner();
            let name = parts.next().ok_or("group: name")?.as_str().to_string();
            let mut cardinality = Cardinality::Required;
            let mut items = Vec::new();
            for part in parts {
                match part.as_rule() {
                    Rule::cardinality => cardinality = parse_cardinality(Some(part))?,
                    Rule::structure_item => items.push(build_item(part)?),
                    _ => {}
                }
            }
            if items.is_empty() {
                return Err(format!("group {} has no items", name));
            }
            Ok(StructureItem::Group { name, cardinality, items })
        }
        _ => Err("Unknown structure item".to_string()),
    }
}

fn parse_cardinality(pair: Option<pest::iterators::Pair<Rule>>) -> Result<Cardinality, String> {
    match pair.map(|p| p.as_str()) {
        None => Ok(Cardinality::Required),
        Some("?") => Ok(Cardinality::Optional),
        Some("*") => Ok(Cardinality::OptionalRepeating),
        Some("+") => Ok(Cardinality::RequiredRepeating),
        Some(other) => Err(format!("Unknown cardinality: {}", other)),
    }
}

fn parse_string(s: &str) -> String {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        s[1..s.len() - 1].replace("\\\"", "\"")
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"
        messages { ADT = "Admit Discharge Transfer"; }
        segments { MSH = "Message Header"; PID = "Patient Identification"; }
        version "2.5" {
            composite XPN {
                1: ST "Family Name";
                2: ST "Given Name";
            }
            segment PID {
                1: SI "Set ID";
                2: XPN "Patient Name";
            }
            structure ADT_A01 {
                MSH;
                PID?;
                group VISIT* {
                    PV1;
                    OBX*;
                }
            }
            event ADT_A04 = ADT_A01;
        }
    "#;

    #[test]
    fn parses_all_sections() {
        let schema = parse_schema(SMALL).expect("parse");
        assert_eq!(schema.messages.get("ADT").map(String::as_str), Some("Admit Discharge Transfer"));
        assert_eq!(schema.segments.len(), 2);
        let v = &schema.versions[0];
        assert_eq!(v.version, "2.5");
        assert_eq!(v.segment("PID").and_then(|s| s.field(2)).map(|e| e.data_type.as_str()), Some("XPN"));
        assert_eq!(v.composite("XPN").map(|c| c.components.len()), Some(2));
        assert_eq!(v.events.get("ADT_A04").map(String::as_str), Some("ADT_A01"));
        let s = v.structure("ADT_A01").expect("structure");
        assert_eq!(s.items.len(), 3);
        match &s.items[2] {
            StructureItem::Group { name, cardinality, items } => {
                assert_eq!(name, "VISIT");
                assert_eq!(*cardinality, Cardinality::OptionalRepeating);
                assert_eq!(items.len(), 2);
                assert_eq!(items[1].cardinality(), Cardinality::OptionalRepeating);
            }
            other => panic!("expected group, got {:?}", other),
        }
        assert_eq!(s.items[1].cardinality(), Cardinality::Optional);
    }

    #[test]
    fn rejects_out_of_order_elements() {
        let src = r#"version "2.5" { segment PID { 1: SI "Set ID"; 3: CX "Id"; } }"#;
        let err = parse_schema(src).unwrap_err();
        assert!(err.contains("out of order"), "{}", err);
    }

    #[test]
    fn rejects_duplicate_segment() {
        let src = r#"version "2.5" { segment PID { } segment PID { } }"#;
        assert!(parse_schema(src).unwrap_err().contains("Duplicate segment"));
    }

    #[test]
    fn rejects_syntax_error() {
        assert!(parse_schema("version 2.5 {}").unwrap_err().starts_with("Parse error"));
    }

    #[test]
    fn rejects_empty_group() {
        let src = r#"version "2.5" { structure X { MSH; group G { } } }"#;
        assert!(parse_schema(src).unwrap_err().contains("group G has no items"));
    }
}
