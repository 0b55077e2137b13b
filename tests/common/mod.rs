//! Shared sample exports and helpers for integration tests.

use std::io::Write;

use tempfile::NamedTempFile;

/// Two letters in the blank-line layout read by the `amsterdam` profile.
///
/// The first record carries a multi-line Keywords field and an unmapped
/// `Label` line; the second lacks most fields.
pub const AMSTERDAM_EXPORT: &str = "\
Reference Type: Letter
Record Number: 101
Year: 1650
Title: Amsterdam
Secondary Author: Pieter de Graeff
Secondary Title: Leiden
Date: 12 March 1650
Keywords: trade
shipping
Label: draft
Custom 4: NL-AsdSAA-101

Reference Type: Letter
Record Number: 102
Year: 1651
";

/// The same kind of letters without blank separators, for the `endnote` profile.
pub const ENDNOTE_EXPORT: &str = "\
Reference Type: Letter
Record Number: 201
Title: Delft
Notes: seal damaged
Reference Type: Letter
Record Number: 202
Title: Haarlem
Research Notes: copy
Notes: original lost
";

/// Create a temporary file with the given content and extension.
pub fn create_temp_file(content: &str, extension: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(extension)
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
