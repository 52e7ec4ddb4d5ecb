//! Lint HL7 v2 message files: decode, validate, and print positioned annotations.
//!
//! Usage:
//!   lint_msg [OPTIONS] [FILE ...]
//!   lint_msg < message.hl7
//!
//! Options:
//!   --version, -v <V>    Highest | Default | Generic | explicit version (default: Default)
//!   --highlight, -s <S>  Mark primitives equal to S (case-insensitive)
//!   --offset, -o <N>     Print the position, path and description at character offset N
//!   --path <P>           Print the position and range of a path (e.g. /PID-5-1)
//!   --dump               Print the group/segment layout
//!   --json               JSON output
//!   --human, -H          Human-readable output
//!
//! Line feeds are treated as segment terminators. Exit code 1 if any error annotation or
//! decode failure. Logging goes to stderr; set `LINT_MSG_LOG` (e.g. `debug`) to change it.

use anyhow::{anyhow, bail, Context};
use hl7lens::editor::{
    get_annotations, get_structural_info, position_for_offset, position_for_path, range_for_position,
    resolve_path,
};
use hl7lens::{dump_locations, normalize_terminators, Annotation, VersionSpec};
use serde::Serialize;
use std::io::{self, Read};
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy)]
enum OutputStyle {
    Compact,
    Human,
    Json,
}

struct Options {
    version: VersionSpec,
    highlight: Option<String>,
    offset: Option<usize>,
    path: Option<String>,
    dump: bool,
    style: OutputStyle,
    files: Vec<String>,
}

#[derive(Serialize)]
struct Report<'a> {
    file: &'a str,
    structure: &'a str,
    annotations: &'a [Annotation],
    #[serde(skip_serializing_if = "Option::is_none")]
    lookup: Option<serde_json::Value>,
}

fn take_value(args: &mut Vec<String>, long: &str, short: Option<&str>) -> anyhow::Result<Option<String>> {
    let Some(pos) = args.iter().position(|a| a == long || Some(a.as_str()) == short) else {
        return Ok(None);
    };
    args.remove(pos);
    if pos >= args.len() {
        bail!("{} needs a value", long);
    }
    Ok(Some(args.remove(pos)))
}

fn take_flag(args: &mut Vec<String>, long: &str, short: Option<&str>) -> bool {
    match args.iter().position(|a| a == long || Some(a.as_str()) == short) {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

fn parse_args() -> anyhow::Result<Options> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let version = match take_value(&mut args, "--version", Some("-v"))? {
        Some(v) => v.parse()?,
        None => VersionSpec::Default,
    };
    let highlight = take_value(&mut args, "--highlight", Some("-s"))?;
    let offset = take_value(&mut args, "--offset", Some("-o"))?
        .map(|o| o.parse::<usize>().with_context(|| format!("invalid offset: {}", o)))
        .transpose()?;
    let path = take_value(&mut args, "--path", None)?;
    let dump = take_flag(&mut args, "--dump", None);
    let style = if take_flag(&mut args, "--json", None) {
        OutputStyle::Json
    } else if take_flag(&mut args, "--human", Some("-H")) {
        OutputStyle::Human
    } else {
        OutputStyle::Compact
    };
    if let Some(unknown) = args.iter().find(|a| a.starts_with('-') && a.len() > 1) {
        bail!("unknown option: {}", unknown);
    }
    Ok(Options { version, highlight, offset, path, dump, style, files: args })
}

/// Lint one message; returns true if it has errors.
fn lint_one(name: &str, raw: &str, opts: &Options) -> anyhow::Result<bool> {
    let text = normalize_terminators(raw);
    let (message, delims) = get_structural_info(&text, &opts.version)?;
    let annotations = get_annotations(&message, &text, &opts.version, opts.highlight.as_deref());

    let mut lookup = None;
    if let Some(offset) = opts.offset {
        let position = position_for_offset(&text, &delims, offset);
        let resolved = resolve_path(&message, &position, "\n");
        lookup = Some(serde_json::json!({
            "offset": offset,
            "position": position,
            "range": range_for_position(&text, &delims, &position),
            "resolved": resolved,
        }));
    }
    if let Some(path) = &opts.path {
        let position = position_for_path(&message, path).ok_or_else(|| anyhow!("no element at path {}", path))?;
        lookup = Some(serde_json::json!({
            "path": path,
            "position": position,
            "range": range_for_position(&text, &delims, &position),
        }));
    }

    match opts.style {
        OutputStyle::Json => {
            let report = Report { file: name, structure: &message.structure, annotations: &annotations, lookup };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputStyle::Compact => {
            for a in annotations.iter().filter(|a| a.is_error()) {
                println!("{}: {}", name, a);
            }
            if let Some(lookup) = &lookup {
                println!("{}: {}", name, lookup);
            }
        }
        OutputStyle::Human => {
            println!("{} [{}]", name, message.structure);
            for a in &annotations {
                println!("  {}", a);
            }
            if let Some(offset) = opts.offset {
                let position = position_for_offset(&text, &delims, offset);
                let resolved = resolve_path(&message, &position, "\n    ");
                println!("  offset {} -> {} {} = {:?}", offset, position, resolved.path, resolved.value);
                println!("    {}", resolved.description);
            }
            if let Some(lookup) = &lookup {
                if opts.path.is_some() {
                    println!("  {}", lookup);
                }
            }
        }
    }
    if opts.dump {
        print!("{}", dump_locations(&message));
    }
    Ok(annotations.iter().any(Annotation::is_error))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("LINT_MSG_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let opts = parse_args()?;
    let mut has_error = false;
    let mut total_errors = 0usize;

    let inputs: Vec<(String, anyhow::Result<String>)> = if opts.files.is_empty() {
        let mut src = String::new();
        let read = io::stdin().read_to_string(&mut src).map(|_| src).map_err(anyhow::Error::from);
        vec![("<stdin>".to_string(), read)]
    } else {
        opts.files
            .iter()
            .map(|f| {
                let path = Path::new(f);
                let read = std::fs::read_to_string(path).with_context(|| format!("{}", path.display()));
                (path.display().to_string(), read)
            })
            .collect()
    };

    for (name, read) in inputs {
        let result = read.and_then(|src| lint_one(&name, &src, &opts));
        match result {
            Ok(true) => {
                total_errors += 1;
                has_error = true;
            }
            Ok(false) => {}
            Err(e) => {
                eprintln!("{}: {:#}", name, e);
                has_error = true;
            }
        }
    }

    if total_errors > 0 {
        eprintln!("lint: {} message(s) with errors", total_errors);
    }
    if has_error {
        std::process::exit(1);
    }
    Ok(())
}
