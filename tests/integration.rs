//! Integration tests using TOML fixtures.
//!
//! This test harness loads test cases from TOML files in the `fixtures/` directory,
//! converts each fixture's input with its profile and compares the output table.

mod common;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use refsheet::profile::{parse_profile, resolve_profile};
use refsheet::{
    parse_records, project, Dialect, FieldFilter, FieldValue, OutputTable, ParserConfig, Profile,
};

use common::{AMSTERDAM_EXPORT, ENDNOTE_EXPORT};

/// A test fixture loaded from a TOML file.
#[derive(Debug, Deserialize)]
struct Fixture {
    /// Description of the test case
    name: String,
    /// Raw export text
    input: String,
    /// Builtin profile name (used when `profile_toml` is absent)
    #[serde(default)]
    profile: Option<String>,
    /// Inline profile TOML
    #[serde(default)]
    profile_toml: Option<String>,
    /// Expected output columns, in order
    #[serde(default)]
    columns: Option<Vec<String>>,
    /// Expected rows; columns not listed must be empty
    #[serde(default)]
    rows: Vec<BTreeMap<String, String>>,
}

impl Fixture {
    fn profile(&self) -> Profile {
        match (&self.profile_toml, &self.profile) {
            (Some(toml), _) => parse_profile(toml).unwrap(),
            (None, Some(name)) => resolve_profile(name).unwrap(),
            (None, None) => panic!("fixture '{}' names no profile", self.name),
        }
    }
}

/// Load all fixtures from a directory.
fn load_fixtures(dir: &Path) -> Vec<(String, Fixture)> {
    let mut fixtures = Vec::new();

    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();

        if path.extension().map_or(false, |e| e == "toml") {
            let content = fs::read_to_string(&path).unwrap();
            let fixture: Fixture = toml::from_str(&content)
                .unwrap_or_else(|e| panic!("invalid fixture {}: {}", path.display(), e));
            let name = path.file_stem().unwrap().to_string_lossy().to_string();
            fixtures.push((name, fixture));
        }
    }

    fixtures.sort_by(|a, b| a.0.cmp(&b.0));
    fixtures
}

fn check_table(name: &str, fixture: &Fixture, table: &OutputTable) {
    if let Some(columns) = &fixture.columns {
        assert_eq!(
            &table.columns, columns,
            "Test '{}' failed: unexpected columns",
            name
        );
    }

    assert_eq!(
        table.len(),
        fixture.rows.len(),
        "Test '{}' ({}) failed: expected {} rows, got {:?}",
        name,
        fixture.name,
        fixture.rows.len(),
        table.rows
    );

    for (index, expected) in fixture.rows.iter().enumerate() {
        for column in expected.keys() {
            assert!(
                table.column_index(column).is_some(),
                "Test '{}' failed: expected column '{}' is missing from {:?}",
                name,
                column,
                table.columns
            );
        }
        for (column, cell) in table.row_pairs(index) {
            assert_eq!(
                cell,
                expected.get(column).map(String::as_str),
                "Test '{}' failed: row {} column '{}'",
                name,
                index,
                column
            );
        }
    }
}

#[test]
fn test_fixtures() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    let fixtures = load_fixtures(&dir);
    assert!(!fixtures.is_empty(), "no fixtures found in {}", dir.display());

    for (name, fixture) in &fixtures {
        println!("Fixture '{}': {}", name, fixture.name);
        let table = fixture.profile().convert(&fixture.input);
        check_table(name, fixture, &table);
    }
}

// ============================================
// Tests on the shared sample exports
// ============================================

#[test]
fn test_amsterdam_export_end_to_end() {
    // Given: the letters export and the default profile
    let profile = resolve_profile("amsterdam").unwrap();

    // When: we convert it
    let table = profile.convert(AMSTERDAM_EXPORT);

    // Then: both letters are rows with renamed, joined fields
    assert_eq!(table.len(), 2);
    assert_eq!(table.cell(0, "Reference Type"), Some("Letter"));
    assert_eq!(table.cell(0, "Sender Place"), Some("Amsterdam"));
    assert_eq!(table.cell(0, "Receiver"), Some("Pieter de Graeff"));
    assert_eq!(table.cell(0, "Receiver Place"), Some("Leiden"));
    assert_eq!(table.cell(0, "date"), Some("12 March 1650"));
    assert_eq!(table.cell(0, "Keywords"), Some("trade, shipping"));
    assert_eq!(table.cell(0, "Digital ID"), Some("NL-AsdSAA-101"));
    assert_eq!(table.cell(1, "Record Number"), Some("102"));
    assert_eq!(table.cell(1, "Sender Place"), None);
    assert_eq!(table.cell(1, "Keywords"), None);

    // And: the unmapped Label line is in no cell
    assert!(table
        .rows
        .iter()
        .flatten()
        .flatten()
        .all(|cell| !cell.contains("draft")));
}

#[test]
fn test_endnote_export_end_to_end() {
    let profile = resolve_profile("endnote").unwrap();

    let table = profile.convert(ENDNOTE_EXPORT);

    assert_eq!(table.len(), 2);
    assert!(table.column_index("Reference Type").is_none());
    assert_eq!(table.cell(0, "Record Number"), Some("201"));
    assert_eq!(table.cell(0, "Research Notes"), Some("seal damaged"));
    assert_eq!(table.cell(1, "Sender Place"), Some("Haarlem"));
    assert_eq!(table.cell(1, "Research Notes"), Some("copy, original lost"));
}

#[test]
fn test_each_row_matches_its_own_record() {
    // Given: records with disjoint fields
    let config = ParserConfig::new(Dialect::BlankLine);
    let records = parse_records(
        "Year: 1650\n\nTitle: Leiden\n\nYear: 1652\nKeywords: a\nb\n",
        &config,
    );
    let profile = resolve_profile("amsterdam").unwrap();

    // When: we project them
    let table = project(&records, &profile.projection);

    // Then: every cell is either that record's own value or empty
    for (index, record) in records.iter().enumerate() {
        for (column, cell) in table.row_pairs(index) {
            let source = profile
                .projection
                .mapping
                .sources()
                .find(|s| profile.projection.mapping.target(s) == Some(column))
                .unwrap();
            let expected = record.get(source).map(|v| v.joined(", "));
            assert_eq!(cell, expected.as_deref(), "row {} column {}", index, column);
        }
    }
}

#[test]
fn test_raw_lists_available_before_projection() {
    // Given: a recurring field
    let config = ParserConfig::new(Dialect::BlankLine).with_fields(FieldFilter::only(["Author"]));

    // When: we only parse
    let records = parse_records("Author: A\nAuthor: B\n", &config);

    // Then: the caller still sees the raw list
    assert_eq!(
        records[0].get("Author"),
        Some(&FieldValue::Multi(vec!["A".to_string(), "B".to_string()]))
    );
}

#[test]
fn test_crlf_and_bare_cr_line_endings() {
    let profile = resolve_profile("amsterdam").unwrap();

    let crlf = profile.convert("Year: 1650\r\nKeywords: a\r\nb\r\n\r\nYear: 1651\r\n");
    let bare_cr = profile.convert("Year: 1650\rKeywords: a\rb\r\rYear: 1651\r");

    assert_eq!(crlf, bare_cr);
    assert_eq!(crlf.len(), 2);
    assert_eq!(crlf.cell(0, "Keywords"), Some("a, b"));
}
