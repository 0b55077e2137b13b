//! refsheet: convert tagged reference-manager exports into spreadsheets.
//!
//! This library provides functionality to:
//! - Load line-oriented `Key: value` exports (EndNote-style text output)
//! - Split them into records under one of three boundary dialects
//! - Rename, join and project record fields onto a fixed column list
//! - Write the resulting table as xlsx, CSV or JSON

pub mod input;
pub mod normalizer;
pub mod output;
pub mod parser;
pub mod profile;
pub mod record;

pub use input::{load_export, split_lines};
pub use normalizer::{
    normalize_record, project, rename_record, ColumnMapping, ListPolicy, OutputTable, Projection,
    UnmappedFields,
};
pub use output::{default_output_path, write_table, OutputFormat};
pub use parser::{
    parse_records, Dialect, FieldFilter, ParserConfig, RecordParser, UnknownKeyPolicy,
};
pub use profile::{builtin_profile, load_profile, resolve_profile, Profile};
pub use record::{FieldValue, Record};
