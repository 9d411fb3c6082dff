//! Loader for chart files produced by the import layer.
//!
//! A chart file is JSON:
//!
//! ```text
//! {
//!   "table_id": "A(H3N2):HI:CDC:20090601",      (optional, derived from info)
//!   "info": {"virus_type": "A(H3N2)", "lab": "CDC", "assay": "HI", "date": "2009-06-01"},
//!   "antigens": [{"name": "A(H3N2)/PERTH/16/2009", "passage": "E3", "date": "2009-04-12"}],
//!   "sera": [{"name": "A(H3N2)/PERTH/16/2009", "serum_id": "F27/10", "homologous": 0}],
//!   "titers": [["1280"]]
//! }
//! ```

use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;

use flate2::read::GzDecoder;

use crate::core::chart::Chart;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid chart: {0}")]
    InvalidFormat(String),
}

/// Check if the path is a gzipped file
#[allow(clippy::case_sensitive_file_extension_comparisons)] // Already lowercased
pub fn is_gzipped(path: &Path) -> bool {
    let path_str = path.to_string_lossy().to_lowercase();
    path_str.ends_with(".gz") || path_str.ends_with(".bgz")
}

/// Open a file for reading, decompressing gzip transparently
///
/// # Errors
///
/// Returns an error if the file cannot be opened.
pub fn open_reader(path: &Path) -> Result<Box<dyn Read>, std::io::Error> {
    let file = std::fs::File::open(path)?;
    if is_gzipped(path) {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Parse a chart file
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, `ParseError::Json` if it
/// is not valid chart JSON, or `ParseError::InvalidFormat` if it is structurally
/// inconsistent.
pub fn parse_chart_file(path: &Path) -> Result<Chart, ParseError> {
    let chart: Chart = serde_json::from_reader(open_reader(path)?)?;
    validate(chart)
}

/// Parse chart JSON text
///
/// # Errors
///
/// Returns `ParseError::Json` if the text is not valid chart JSON, or
/// `ParseError::InvalidFormat` if it is structurally inconsistent.
pub fn parse_chart_text(text: &str) -> Result<Chart, ParseError> {
    let chart: Chart = serde_json::from_str(text)?;
    validate(chart)
}

fn validate(chart: Chart) -> Result<Chart, ParseError> {
    if chart.table_id.is_none() && chart.info.virus_type.is_empty() {
        return Err(ParseError::InvalidFormat(
            "neither table_id nor info.virus_type given".to_string(),
        ));
    }
    if let Some(row) = chart
        .titers
        .iter()
        .position(|row| row.len() != chart.sera.len())
    {
        return Err(ParseError::InvalidFormat(format!(
            "titer row {} has {} values for {} sera",
            row + 1,
            chart.titers[row].len(),
            chart.sera.len()
        )));
    }
    if !chart.titers.is_empty() && chart.titers.len() != chart.antigens.len() {
        return Err(ParseError::InvalidFormat(format!(
            "{} titer rows for {} antigens",
            chart.titers.len(),
            chart.antigens.len()
        )));
    }
    Ok(chart)
}
