//! Export file loading.
//!
//! Reads a whole tagged export into memory and decodes it as text. Decoding
//! never fails: invalid UTF-8 is replaced so the parser always gets a string.

use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::{info, warn};

/// Errors that can occur when loading an export.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Loads an export from `path`, or from stdin when `path` is `-`.
///
/// # Errors
///
/// Returns an error if the file (or stdin) cannot be read.
pub fn load_export(path: &Path) -> Result<String, InputError> {
    let bytes = if path == Path::new("-") {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        buf
    } else {
        fs::read(path)?
    };

    info!(path = %path.display(), bytes = bytes.len(), "loaded export");
    Ok(decode_text(bytes))
}

/// Decodes raw export bytes, stripping a leading UTF-8 byte order mark.
pub fn decode_text(bytes: Vec<u8>) -> String {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes[..]);
    match std::str::from_utf8(body) {
        Ok(text) => text.to_string(),
        Err(e) => {
            warn!(
                valid_up_to = e.valid_up_to(),
                "export is not valid UTF-8, replacing invalid sequences"
            );
            String::from_utf8_lossy(body).into_owned()
        }
    }
}

fn newline() -> &'static Regex {
    static NEWLINE: OnceLock<Regex> = OnceLock::new();
    NEWLINE.get_or_init(|| Regex::new(r"\r\n|\r|\n").expect("newline pattern is valid"))
}

/// Splits text into lines on `\r\n`, `\r` or `\n`.
///
/// A single trailing terminator does not produce an extra empty line.
pub fn split_lines(text: &str) -> impl Iterator<Item = &str> + '_ {
    let body = text
        .strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .or_else(|| text.strip_suffix('\r'))
        .unwrap_or(text);
    newline().split(body)
}
