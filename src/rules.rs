//! Primitive type rules and per-version validation contexts.
//!
//! A rule has two steps: [`PrimitiveRule::correct`] normalises the raw value (whitespace
//! trimming) and [`PrimitiveRule::check`] tests the corrected value. Descriptions contain
//! `%s`, which the validator replaces with the raw value.
//!
//! | Types | Correction | Check |
//! |-------|------------|-------|
//! | ST | trim trailing whitespace | at most 200 characters |
//! | TX, FT | trim trailing whitespace | at most 65536 characters |
//! | ID, IS | trim leading whitespace | none |
//! | NM, SI | none | numeric format |
//! | DT, TM, DTM, TS | none | date/time format |
//! | TN (2.4 and older) | none | North American phone format |
//!
//! Contexts are built once per version and cached for the life of the process.

use crate::decode::VersionSpec;
use crate::model::Message;
use crate::schema::version_key;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

/// Versions the rule set knows about, oldest first.
pub const KNOWN_VERSIONS: &[&str] = &[
    "2.1", "2.2", "2.3", "2.3.1", "2.4", "2.5", "2.5.1", "2.6", "2.7", "2.7.1", "2.8",
];

/// Last version with a TN (telephone number) primitive rule.
const LAST_TN_VERSION: &str = "2.4";

const NUMBER: &str = r"(\+|-)?\d*\.?\d*";
const SEQUENCE: &str = r"\d*";
const DATE: &str = r"(\d{4}([01]\d(\d{2})?)?)?";
const TIME: &str = r"([012]\d([0-5]\d([0-5]\d(\.\d(\d(\d(\d)?)?)?)?)?)?)?([+-]\d{4})?";
const DATE_TIME: &str =
    r"(\d{4}([01]\d(\d{2}([012]\d([0-5]\d([0-5]\d(\.\d(\d(\d(\d)?)?)?)?)?)?)?)?)?)?([+-]\d{4})?";
const TELEPHONE: &str = r"(\d{1,2} )?(\(\d{3}\))?\d{3}-\d{4}(X\d{1,5})?(B\d{1,5})?(C.*)?";

static CONTEXTS: Lazy<DashMap<String, Arc<ValidationContext>>> = Lazy::new(DashMap::new);

/// A validation rule for one primitive type.
pub trait PrimitiveRule: Send + Sync {
    /// Normalise `value` before checking.
    fn correct<'v>(&self, value: &'v str) -> Cow<'v, str>;
    /// True if the corrected value is valid.
    fn check(&self, value: &str) -> bool;
    /// Error text; `%s` stands for the value.
    fn description(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trim {
    None,
    Leading,
    Trailing,
}

impl Trim {
    fn apply<'v>(self, value: &'v str) -> Cow<'v, str> {
        match self {
            Trim::None => Cow::Borrowed(value),
            Trim::Leading => Cow::Borrowed(value.trim_start()),
            Trim::Trailing => Cow::Borrowed(value.trim_end()),
        }
    }
}

/// Whole-value regex match.
#[derive(Debug)]
pub struct RegexRule {
    pattern: Regex,
    trim: Trim,
    description: String,
}

impl RegexRule {
    pub fn new(pattern: &str, trim: Trim, description: &str) -> Result<Self, regex::Error> {
        Ok(RegexRule {
            pattern: Regex::new(&format!("^(?:{})$", pattern))?,
            trim,
            description: description.to_string(),
        })
    }
}

impl PrimitiveRule for RegexRule {
    fn correct<'v>(&self, value: &'v str) -> Cow<'v, str> {
        self.trim.apply(value)
    }

    fn check(&self, value: &str) -> bool {
        self.pattern.is_match(value)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Maximum length in characters.
#[derive(Debug)]
pub struct LengthRule {
    max: usize,
    trim: Trim,
    description: String,
}

impl LengthRule {
    pub fn new(max: usize, trim: Trim) -> Self {
        LengthRule {
            max,
            trim,
            description: format!("Value '%s' exceeds the maximum length of {}", max),
        }
    }
}

impl PrimitiveRule for LengthRule {
    fn correct<'v>(&self, value: &'v str) -> Cow<'v, str> {
        self.trim.apply(value)
    }

    fn check(&self, value: &str) -> bool {
        value.chars().count() <= self.max
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Correction only; every value passes.
#[derive(Debug)]
pub struct TrimRule(pub Trim);

impl PrimitiveRule for TrimRule {
    fn correct<'v>(&self, value: &'v str) -> Cow<'v, str> {
        self.0.apply(value)
    }

    fn check(&self, _value: &str) -> bool {
        true
    }

    fn description(&self) -> &str {
        "%s"
    }
}

/// Rules per primitive type for one version.
pub struct ValidationContext {
    version: String,
    rules: HashMap<String, Vec<Box<dyn PrimitiveRule>>>,
}

impl std::fmt::Debug for ValidationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&String> = self.rules.keys().collect();
        types.sort();
        f.debug_struct("ValidationContext")
            .field("version", &self.version)
            .field("types", &types)
            .finish()
    }
}

impl ValidationContext {
    /// Build the built-in rules for `version`.
    pub fn new(version: &str) -> Self {
        let mut ctx = ValidationContext { version: version.to_string(), rules: HashMap::new() };
        ctx.add("ST", Box::new(LengthRule::new(200, Trim::Trailing)));
        ctx.add("TX", Box::new(LengthRule::new(65536, Trim::Trailing)));
        ctx.add("FT", Box::new(LengthRule::new(65536, Trim::Trailing)));
        ctx.add("ID", Box::new(TrimRule(Trim::Leading)));
        ctx.add("IS", Box::new(TrimRule(Trim::Leading)));
        ctx.add_regex("NM", NUMBER, Trim::None, "Value '%s' is not a valid number");
        ctx.add_regex("SI", SEQUENCE, Trim::None, "Value '%s' is not a valid sequence ID");
        ctx.add_regex("DT", DATE, Trim::None, "Value '%s' is not a valid date (YYYY[MM[DD]])");
        ctx.add_regex("TM", TIME, Trim::None, "Value '%s' is not a valid time (HH[MM[SS[.S[S[S[S]]]]]][+/-ZZZZ])");
        for data_type in ["DTM", "TS"] {
            ctx.add_regex(
                data_type,
                DATE_TIME,
                Trim::None,
                "Value '%s' is not a valid date/time (YYYY[MM[DD[HH[MM[SS[.S[S[S[S]]]]]]]]][+/-ZZZZ])",
            );
        }
        if version_key(version) <= version_key(LAST_TN_VERSION) {
            ctx.add_regex(
                "TN",
                TELEPHONE,
                Trim::None,
                "Value '%s' is not a valid telephone number ([NN] [(999)]999-9999[X99999][B99999][C any text])",
            );
        }
        ctx
    }

    fn add(&mut self, data_type: &str, rule: Box<dyn PrimitiveRule>) {
        self.rules.entry(data_type.to_string()).or_default().push(rule);
    }

    fn add_regex(&mut self, data_type: &str, pattern: &str, trim: Trim, description: &str) {
        match RegexRule::new(pattern, trim, description) {
            Ok(rule) => self.add(data_type, Box::new(rule)),
            Err(e) => tracing::error!(data_type, error = %e, "invalid rule pattern"),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Rules for `data_type`, empty when the type has none.
    pub fn rules_for(&self, data_type: &str) -> &[Box<dyn PrimitiveRule>] {
        self.rules.get(data_type).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Cached context for `version`, created on first use.
pub fn context_for(version: &str) -> Arc<ValidationContext> {
    CONTEXTS
        .entry(version.to_string())
        .or_insert_with(|| {
            tracing::debug!(version, "building validation context");
            Arc::new(ValidationContext::new(version))
        })
        .value()
        .clone()
}

pub fn newest_version() -> &'static str {
    KNOWN_VERSIONS.last().copied().unwrap_or(LAST_TN_VERSION)
}

/// Version whose rules apply to `message` under `selector`: the declared MSH-12 version for
/// `Default` and `Generic`, the newest known version for `Highest`.
pub fn rule_version(selector: &VersionSpec, message: &Message) -> String {
    match selector {
        VersionSpec::Default | VersionSpec::Generic => message.declared_version.clone(),
        VersionSpec::Highest => newest_version().to_string(),
        VersionSpec::Exact(v) => v.clone(),
    }
}
