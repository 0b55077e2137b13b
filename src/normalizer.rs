//! Field normalization and projection onto output columns.
//!
//! Turns parsed records into an [`OutputTable`]: fields are renamed through a
//! [`ColumnMapping`], administrative columns are dropped, multi-valued fields
//! are joined with `", "`, and every record becomes one row in the mapping's
//! declared column order. Missing fields become `None` cells.
//!
//! Joining is lossy: a comma inside a source value cannot be told apart from
//! the list separator afterwards.

use std::collections::BTreeSet;

use serde::Deserialize;
use tracing::info;

use crate::record::{FieldValue, Record, LIST_SEPARATOR};

/// Ordered source-to-destination field renames.
///
/// The declaration order fixes the output column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    pairs: Vec<(String, String)>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mapping that keeps every listed name as is.
    pub fn identity<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .map(|name| {
                let name = name.into();
                (name.clone(), name)
            })
            .collect()
    }

    /// Maps `source` to `target`, replacing an earlier entry for `source`.
    pub fn insert(&mut self, source: impl Into<String>, target: impl Into<String>) {
        let source = source.into();
        let target = target.into();
        match self.pairs.iter_mut().find(|(s, _)| *s == source) {
            Some(entry) => entry.1 = target,
            None => self.pairs.push((source, target)),
        }
    }

    pub fn with(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.insert(source, target);
        self
    }

    /// Destination name for `source`, if it is mapped.
    pub fn target(&self, source: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(s, _)| s == source)
            .map(|(_, t)| t.as_str())
    }

    pub fn contains_source(&self, source: &str) -> bool {
        self.target(source).is_some()
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(s, _)| s.as_str())
    }

    /// Distinct destination names in declared order.
    pub fn columns(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.pairs
            .iter()
            .map(|(_, t)| t.as_str())
            .filter(|t| seen.insert(*t))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<S: Into<String>, T: Into<String>> FromIterator<(S, T)> for ColumnMapping {
    fn from_iter<I: IntoIterator<Item = (S, T)>>(iter: I) -> Self {
        let mut mapping = ColumnMapping::new();
        for (source, target) in iter {
            mapping.insert(source, target);
        }
        mapping
    }
}

/// Treatment of fields that have no entry in the [`ColumnMapping`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnmappedFields {
    /// Dropped entirely.
    #[default]
    Drop,
    /// Kept under their own name and emitted after the declared columns.
    PassThrough,
}

/// Treatment of multi-valued fields in normalized records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListPolicy {
    /// Lists become one `", "`-joined string.
    #[default]
    Join,
    /// Lists are kept as lists. Table cells are still joined.
    Keep,
}

/// Collapses multi-valued fields according to `policy`.
pub fn normalize_record(record: &Record, policy: ListPolicy) -> Record {
    match policy {
        ListPolicy::Keep => record.clone(),
        ListPolicy::Join => record
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    FieldValue::Multi(_) => FieldValue::Scalar(value.joined(LIST_SEPARATOR)),
                    FieldValue::Scalar(_) => value.clone(),
                };
                (name.to_string(), value)
            })
            .collect(),
    }
}

/// Renames every field through `mapping`.
///
/// Fields that land on the same destination are merged in source order.
pub fn rename_record(record: &Record, mapping: &ColumnMapping, unmapped: UnmappedFields) -> Record {
    let mut renamed = Record::new();
    for (name, value) in record.iter() {
        let target = match (mapping.target(name), unmapped) {
            (Some(target), _) => target,
            (None, UnmappedFields::PassThrough) => name,
            (None, UnmappedFields::Drop) => continue,
        };
        renamed.merge_value(target, value.clone());
    }
    renamed
}

/// Everything needed to turn records into table rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub mapping: ColumnMapping,
    pub unmapped: UnmappedFields,
    /// Destination names removed from the output.
    pub drop_columns: BTreeSet<String>,
    pub list_policy: ListPolicy,
}

impl Projection {
    pub fn new(mapping: ColumnMapping) -> Self {
        Self {
            mapping,
            ..Self::default()
        }
    }

    pub fn with_unmapped(mut self, unmapped: UnmappedFields) -> Self {
        self.unmapped = unmapped;
        self
    }

    pub fn with_drop_column(mut self, column: impl Into<String>) -> Self {
        self.drop_columns.insert(column.into());
        self
    }

    pub fn with_list_policy(mut self, list_policy: ListPolicy) -> Self {
        self.list_policy = list_policy;
        self
    }

    /// Output columns for `records`.
    ///
    /// Declared destinations come first in mapping order. With
    /// [`UnmappedFields::PassThrough`], unmapped field names follow in the
    /// order they are first seen.
    pub fn columns(&self, records: &[Record]) -> Vec<String> {
        let mut columns: Vec<String> = self
            .mapping
            .columns()
            .into_iter()
            .filter(|c| !self.drop_columns.contains(*c))
            .map(str::to_string)
            .collect();

        if self.unmapped == UnmappedFields::PassThrough {
            for record in records {
                for name in record.names() {
                    if self.mapping.contains_source(name)
                        || self.drop_columns.contains(name)
                        || columns.iter().any(|c| c == name)
                    {
                        continue;
                    }
                    columns.push(name.to_string());
                }
            }
        }

        columns
    }

    /// Renames, drops administrative columns, then applies the list policy.
    pub fn apply(&self, record: &Record) -> Record {
        let mut renamed = rename_record(record, &self.mapping, self.unmapped);
        for column in &self.drop_columns {
            renamed.remove(column);
        }
        normalize_record(&renamed, self.list_policy)
    }
}

/// Column-ordered rows ready to be written out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputTable {
    pub columns: Vec<String>,
    /// One row per record; each row has one cell per column.
    pub rows: Vec<Vec<Option<String>>>,
}

impl OutputTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// The cell of `row` under `column`, or `None` when missing.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)?.as_deref()
    }

    /// `(column, cell)` pairs of one row, in column order.
    pub fn row_pairs(&self, row: usize) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.columns
            .iter()
            .zip(self.rows.get(row).into_iter().flatten())
            .map(|(column, cell)| (column.as_str(), cell.as_deref()))
    }
}

/// Builds the output table for `records`.
pub fn project(records: &[Record], projection: &Projection) -> OutputTable {
    let columns = projection.columns(records);
    let rows: Vec<Vec<Option<String>>> = records
        .iter()
        .map(|record| {
            let projected = projection.apply(record);
            columns
                .iter()
                .map(|column| projected.get(column).map(|v| v.joined(LIST_SEPARATOR)))
                .collect()
        })
        .collect();

    info!(
        rows = rows.len(),
        columns = columns.len(),
        "projected records onto output table"
    );

    OutputTable { columns, rows }
}
