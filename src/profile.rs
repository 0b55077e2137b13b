//! Conversion profiles.
//!
//! A profile bundles the parser settings (dialect, allow-list, aliases) with
//! the projection (column mapping, dropped columns, list policy). Profiles
//! are TOML documents; a few ship with the binary and others can be loaded
//! from a path.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::normalizer::{project, ColumnMapping, ListPolicy, OutputTable, Projection, UnmappedFields};
use crate::parser::{
    parse_records, Dialect, FieldFilter, ParserConfig, UnknownKeyPolicy, DEFAULT_SENTINEL,
};
use crate::record::Record;

/// Errors that can occur when loading profiles.
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid profile: {0}")]
    Invalid(String),

    #[error("'{0}' is not a builtin profile name and no file with this path exists")]
    NotFound(String),
}

/// Profile used when none is given.
pub const DEFAULT_PROFILE: &str = "amsterdam";

/// A complete conversion setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub parser: ParserConfig,
    pub projection: Projection,
}

impl Profile {
    /// Parses an export into records.
    pub fn parse(&self, text: &str) -> Vec<Record> {
        parse_records(text, &self.parser)
    }

    /// Parses an export and projects it onto the output columns.
    pub fn convert(&self, text: &str) -> OutputTable {
        project(&self.parse(text), &self.projection)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum AllowKeyword {
    Any,
    Mapped,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AllowSpec {
    Keyword(AllowKeyword),
    Names(Vec<String>),
}

impl Default for AllowSpec {
    fn default() -> Self {
        AllowSpec::Keyword(AllowKeyword::Mapped)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ColumnEntry {
    source: String,
    /// Defaults to `source`.
    target: Option<String>,
}

/// On-disk profile layout.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfileFile {
    #[serde(default)]
    dialect: Dialect,
    #[serde(default)]
    sentinel: Option<String>,
    #[serde(default)]
    allow: AllowSpec,
    #[serde(default)]
    unknown_keys: UnknownKeyPolicy,
    #[serde(default)]
    unmapped: UnmappedFields,
    #[serde(default)]
    drop_columns: Vec<String>,
    #[serde(default)]
    list_policy: ListPolicy,
    #[serde(default)]
    aliases: BTreeMap<String, String>,
    #[serde(default)]
    columns: Vec<ColumnEntry>,
}

impl ProfileFile {
    fn into_profile(self) -> Result<Profile, ProfileError> {
        if self.columns.is_empty() {
            return Err(ProfileError::Invalid(
                "at least one [[columns]] entry is required".to_string(),
            ));
        }

        let mut mapping = ColumnMapping::new();
        for entry in self.columns {
            if entry.source.trim().is_empty() {
                return Err(ProfileError::Invalid("column source must not be empty".to_string()));
            }
            let target = entry.target.unwrap_or_else(|| entry.source.clone());
            mapping.insert(entry.source, target);
        }

        let sentinel = self.sentinel.unwrap_or_else(|| DEFAULT_SENTINEL.to_string());
        if self.dialect == Dialect::Sentinel && sentinel.trim().is_empty() {
            return Err(ProfileError::Invalid(
                "the sentinel dialect needs a non-empty sentinel field".to_string(),
            ));
        }

        let fields = match self.allow {
            AllowSpec::Keyword(AllowKeyword::Any) => FieldFilter::Any,
            AllowSpec::Keyword(AllowKeyword::Mapped) => FieldFilter::only(mapping.sources()),
            AllowSpec::Names(names) => FieldFilter::only(names),
        };

        Ok(Profile {
            parser: ParserConfig {
                dialect: self.dialect,
                sentinel,
                fields,
                aliases: self.aliases,
                unknown_keys: self.unknown_keys,
            },
            projection: Projection {
                mapping,
                unmapped: self.unmapped,
                drop_columns: self.drop_columns.into_iter().collect(),
                list_policy: self.list_policy,
            },
        })
    }
}

/// Parses a profile from TOML text.
pub fn parse_profile(content: &str) -> Result<Profile, ProfileError> {
    let file: ProfileFile = toml::from_str(content)?;
    file.into_profile()
}

/// Loads a profile from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid profile.
pub fn load_profile(path: &Path) -> Result<Profile, ProfileError> {
    let content = fs::read_to_string(path)?;
    parse_profile(&content)
}

/// Single source of truth for builtin profiles: (name, TOML content).
const BUILTIN_PROFILES: &[(&str, &str)] = &[
    ("amsterdam", include_str!("../profiles/amsterdam.toml")),
    ("endnote", include_str!("../profiles/endnote.toml")),
    ("double-blank", include_str!("../profiles/double-blank.toml")),
];

/// Returns the TOML source of a builtin profile by name.
pub fn builtin_profile(name: &str) -> Option<&'static str> {
    BUILTIN_PROFILES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, content)| *content)
}

/// Returns the list of available builtin profile names.
pub fn builtin_profile_names() -> Vec<&'static str> {
    BUILTIN_PROFILES.iter().map(|(n, _)| *n).collect()
}

/// Resolves a builtin profile name or a path to a profile file.
pub fn resolve_profile(name_or_path: &str) -> Result<Profile, ProfileError> {
    if let Some(content) = builtin_profile(name_or_path) {
        return parse_profile(content);
    }
    let path = Path::new(name_or_path);
    if !path.exists() {
        return Err(ProfileError::NotFound(name_or_path.to_string()));
    }
    load_profile(path)
}
