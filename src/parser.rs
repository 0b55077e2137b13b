//! Line-oriented record parser for tagged reference exports.
//!
//! Each input line is first classified ([`ParserConfig::classify`]) and then
//! fed to a small state machine that owns the open record. Record boundaries
//! depend on the configured [`Dialect`]:
//!
//! - [`Dialect::BlankLine`]: any blank line seals the open record.
//! - [`Dialect::DoubleBlankLine`]: two consecutive blank lines seal it; a
//!   single blank line changes nothing.
//! - [`Dialect::Sentinel`]: a line keyed by the sentinel field seals the open
//!   record and starts a new one; blank lines change nothing.
//!
//! In every dialect the record still open at end of input is emitted.
//! The parser never fails: lines it cannot use are dropped.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tracing::{debug, trace};

use crate::input::split_lines;
use crate::record::Record;

/// Field that opens a new record in the sentinel dialect unless configured otherwise.
pub const DEFAULT_SENTINEL: &str = "Reference Type";

/// Record boundary convention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    #[default]
    #[serde(alias = "blank")]
    BlankLine,
    #[serde(alias = "double-blank")]
    DoubleBlankLine,
    Sentinel,
}

impl Dialect {
    /// Consecutive blank lines that seal an open record, if blank lines seal at all.
    fn blank_run_to_seal(self) -> Option<usize> {
        match self {
            Dialect::BlankLine => Some(1),
            Dialect::DoubleBlankLine => Some(2),
            Dialect::Sentinel => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dialect::BlankLine => "blank-line",
            Dialect::DoubleBlankLine => "double-blank-line",
            Dialect::Sentinel => "sentinel",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blank-line" | "blank" => Ok(Dialect::BlankLine),
            "double-blank-line" | "double-blank" => Ok(Dialect::DoubleBlankLine),
            "sentinel" => Ok(Dialect::Sentinel),
            other => Err(format!(
                "unknown dialect '{}' (expected blank-line, double-blank-line or sentinel)",
                other
            )),
        }
    }
}

/// Which keys may start a new field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldFilter {
    /// Every non-empty key is a field.
    #[default]
    Any,
    /// Only the listed keys are fields (case-sensitive).
    Only(BTreeSet<String>),
}

impl FieldFilter {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldFilter::Only(names.into_iter().map(Into::into).collect())
    }

    pub fn accepts(&self, key: &str) -> bool {
        if key.is_empty() {
            return false;
        }
        match self {
            FieldFilter::Any => true,
            FieldFilter::Only(names) => names.contains(key),
        }
    }
}

/// What happens to a `key: value` line whose key is not accepted.
///
/// Neither choice moves the current-field cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnknownKeyPolicy {
    /// The line is dropped.
    #[default]
    Discard,
    /// The whole line is appended to the current field.
    Continuation,
}

/// Parser settings shared by all dialects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    pub dialect: Dialect,
    /// Only consulted by [`Dialect::Sentinel`].
    pub sentinel: String,
    pub fields: FieldFilter,
    /// Source key to canonical key, resolved before any other check.
    pub aliases: BTreeMap<String, String>,
    pub unknown_keys: UnknownKeyPolicy,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            sentinel: DEFAULT_SENTINEL.to_string(),
            fields: FieldFilter::Any,
            aliases: BTreeMap::new(),
            unknown_keys: UnknownKeyPolicy::default(),
        }
    }
}

/// A `key: value` line whose key was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLine<'a> {
    pub key: &'a str,
    pub value: &'a str,
    /// Set when the key is the sentinel field of the sentinel dialect.
    pub opens_record: bool,
}

/// Classification of one trimmed input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    Blank,
    Field(FieldLine<'a>),
    /// The sentinel key was seen but is not an accepted field.
    Boundary,
    /// Text to append to the current field, if there is one.
    Text(&'a str),
    /// A rejected key line under [`UnknownKeyPolicy::Discard`].
    Ignored(&'a str),
}

impl ParserConfig {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    pub fn with_fields(mut self, fields: FieldFilter) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), canonical.into());
        self
    }

    pub fn with_unknown_keys(mut self, policy: UnknownKeyPolicy) -> Self {
        self.unknown_keys = policy;
        self
    }

    fn resolve_alias<'a>(&'a self, key: &'a str) -> &'a str {
        self.aliases.get(key).map(String::as_str).unwrap_or(key)
    }

    fn is_sentinel(&self, key: &str) -> bool {
        self.dialect == Dialect::Sentinel && key == self.sentinel
    }

    /// Classifies one raw line.
    ///
    /// The line is trimmed, then split on its first colon. The key is trimmed
    /// and alias-resolved before the sentinel and allow-list checks.
    pub fn classify<'a>(&'a self, raw: &'a str) -> Line<'a> {
        let line = raw.trim();
        if line.is_empty() {
            return Line::Blank;
        }

        let Some((key, value)) = line.split_once(':') else {
            return Line::Text(line);
        };

        let key = self.resolve_alias(key.trim());
        let opens_record = self.is_sentinel(key);

        if self.fields.accepts(key) {
            return Line::Field(FieldLine {
                key,
                value: value.trim(),
                opens_record,
            });
        }
        if opens_record {
            return Line::Boundary;
        }

        match self.unknown_keys {
            UnknownKeyPolicy::Continuation => Line::Text(line),
            UnknownKeyPolicy::Discard => Line::Ignored(line),
        }
    }
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    Open {
        record: Record,
        cursor: String,
        blanks: usize,
    },
}

/// Transition function over classified lines.
#[derive(Debug)]
struct Machine {
    dialect: Dialect,
    state: State,
}

impl Machine {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            state: State::Idle,
        }
    }

    /// Advances by one line, returning a record when one is sealed.
    fn step(&mut self, line: Line<'_>) -> Option<Record> {
        match line {
            Line::Blank => self.on_blank(),
            Line::Boundary => self.seal(),
            Line::Field(field) => {
                let sealed = if field.opens_record { self.seal() } else { None };
                self.on_field(field);
                sealed
            }
            Line::Text(text) => {
                self.on_text(text);
                None
            }
            Line::Ignored(text) => {
                trace!(line = text, "discarding unrecognized key line");
                None
            }
        }
    }

    fn on_blank(&mut self) -> Option<Record> {
        let State::Open { blanks, .. } = &mut self.state else {
            return None;
        };
        *blanks += 1;
        match self.dialect.blank_run_to_seal() {
            Some(run) if *blanks >= run => self.seal(),
            _ => None,
        }
    }

    fn on_field(&mut self, field: FieldLine<'_>) {
        match &mut self.state {
            State::Idle => {
                let mut record = Record::new();
                record.insert_value(field.key, field.value);
                self.state = State::Open {
                    record,
                    cursor: field.key.to_string(),
                    blanks: 0,
                };
            }
            State::Open {
                record,
                cursor,
                blanks,
            } => {
                // An empty repeat moves the cursor but adds no empty list item.
                if !(field.value.is_empty() && record.contains(field.key)) {
                    record.insert_value(field.key, field.value);
                }
                field.key.clone_into(cursor);
                *blanks = 0;
            }
        }
    }

    fn on_text(&mut self, text: &str) {
        match &mut self.state {
            State::Idle => trace!(line = text, "discarding text outside a record"),
            State::Open {
                record,
                cursor,
                blanks,
            } => {
                record.append_continuation(cursor, text);
                *blanks = 0;
            }
        }
    }

    fn seal(&mut self) -> Option<Record> {
        match std::mem::take(&mut self.state) {
            State::Open { record, .. } if !record.is_empty() => Some(record),
            _ => None,
        }
    }
}

/// Lazy iterator of records over a line source.
///
/// Records are yielded as soon as their boundary is read; the final open
/// record is yielded once the lines run out.
pub struct Records<'c, I> {
    config: &'c ParserConfig,
    lines: I,
    machine: Machine,
    line_number: usize,
    emitted: usize,
    finished: bool,
}

impl<'c, I> Records<'c, I> {
    fn emit(&mut self, record: Record) -> Record {
        self.emitted += 1;
        debug!(
            record = self.emitted,
            fields = record.len(),
            line = self.line_number,
            "sealed record"
        );
        record
    }
}

impl<'c, I> Iterator for Records<'c, I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        if self.finished {
            return None;
        }
        while let Some(raw) = self.lines.next() {
            self.line_number += 1;
            let line = self.config.classify(raw.as_ref());
            if let Some(record) = self.machine.step(line) {
                return Some(self.emit(record));
            }
        }
        self.finished = true;
        let last = self.machine.seal()?;
        Some(self.emit(last))
    }
}

/// Record parser bound to one configuration.
#[derive(Debug, Clone, Default)]
pub struct RecordParser {
    config: ParserConfig,
}

impl RecordParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Returns a lazy record iterator over `lines`.
    pub fn records<I>(&self, lines: I) -> Records<'_, I::IntoIter>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Records {
            config: &self.config,
            lines: lines.into_iter(),
            machine: Machine::new(self.config.dialect),
            line_number: 0,
            emitted: 0,
            finished: false,
        }
    }

    /// Parses a whole export held in memory.
    pub fn parse(&self, text: &str) -> Vec<Record> {
        self.records(split_lines(text)).collect()
    }
}

/// Parses `text` into records using `config`.
///
/// # Examples
///
/// ```
/// use refsheet::parser::{parse_records, Dialect, ParserConfig};
///
/// let config = ParserConfig::new(Dialect::BlankLine);
/// let records = parse_records("Keywords: alpha\nbeta\n\nYear: 1650\n", &config);
/// assert_eq!(records.len(), 2);
/// ```
pub fn parse_records(text: &str, config: &ParserConfig) -> Vec<Record> {
    let records: Vec<Record> = RecordParser::new(config.clone()).parse(text);
    debug!(
        dialect = %config.dialect,
        records = records.len(),
        "parsed export"
    );
    records
}
