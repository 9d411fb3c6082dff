use std::path::Path;

use crate::core::location::LocDb;
use crate::parsing::chart::{open_reader, ParseError};

/// Parse a location database file (JSON, optionally gzipped)
///
/// ```text
/// {
///   "locations": {"PERTH": {"country": "AUSTRALIA", "continent": "AUSTRALIA-OCEANIA"}},
///   "aliases": {"PERTH WA": "PERTH"},
///   "cdc_abbreviations": {"HK": "HONG KONG"}
/// }
/// ```
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read or `ParseError::Json`
/// if its content is invalid.
pub fn parse_locdb_file(path: &Path) -> Result<LocDb, ParseError> {
    let locdb: LocDb = serde_json::from_reader(open_reader(path)?)?;
    Ok(locdb.normalized())
}

/// # Errors
///
/// Returns `ParseError::Json` if the text is not a valid location database.
pub fn parse_locdb_text(text: &str) -> Result<LocDb, ParseError> {
    let locdb: LocDb = serde_json::from_str(text)?;
    Ok(locdb.normalized())
}
