//! Decomposition of influenza virus names into structured fields.
//!
//! Accepted grammar (fields separated by `/`):
//!
//! ```text
//! TYPE/[HOST/]LOCATION/ISOLATION/YEAR[ PASSAGE]
//! ```
//!
//! e.g. `A(H3N2)/PERTH/16/2009`, `A(H1N1)/SWINE/IOWA/15/1930 E3/E2`.
//! CDC-style names (`HK 1/2009`, two-letter location abbreviation followed by
//! a space) do not follow this grammar and are handled by the callers.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("Empty name")]
    Empty,

    #[error("Name has {0} '/'-separated fields, expected at least 4")]
    MissingSeparators(usize),

    #[error("Unrecognized virus type: {0}")]
    InvalidVirusType(String),

    #[error("Empty {0} field")]
    MissingField(&'static str),

    #[error("Invalid year: {0}")]
    InvalidYear(String),
}

/// Structured fields of a virus name
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameParts {
    pub virus_type: String,
    /// Empty for human isolates
    pub host: String,
    pub location: String,
    pub isolation: String,
    pub year: String,
    /// Anything following the year, e.g. a passage history in a query
    pub passage: String,
}

/// Split a virus name into its fields.
///
/// # Errors
///
/// Returns a [`NameError`] describing why the text does not match the grammar.
pub fn split(name: &str) -> Result<NameParts, NameError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(NameError::Empty);
    }

    let fields: Vec<&str> = name.split('/').collect();
    if fields.len() < 4 {
        return Err(NameError::MissingSeparators(fields.len()));
    }

    // Passage text may itself contain '/'. A year followed by a passage at
    // index 3 is the plain form; otherwise the host form puts the year at
    // index 4 and the plain form at index 3.
    let plain_with_passage = parse_year_field(fields[3])
        .filter(|(_, rest)| !rest.trim().is_empty())
        .map(|(year, rest)| (3, year, rest));
    let (year_at, year, passage_head) = plain_with_passage
        .or_else(|| {
            [4usize, 3]
                .into_iter()
                .filter(|&i| i < fields.len())
                .find_map(|i| parse_year_field(fields[i]).map(|(year, rest)| (i, year, rest)))
        })
        .ok_or_else(|| NameError::InvalidYear(fields[3].to_string()))?;

    let virus_type = fields[0].trim();
    if !is_virus_type(virus_type) {
        return Err(NameError::InvalidVirusType(virus_type.to_string()));
    }

    let (host, location, isolation) = if year_at == 4 {
        (fields[1].trim(), fields[2].trim(), fields[3].trim())
    } else {
        ("", fields[1].trim(), fields[2].trim())
    };
    if year_at == 4 && host.is_empty() {
        return Err(NameError::MissingField("host"));
    }
    if location.is_empty() {
        return Err(NameError::MissingField("location"));
    }
    if isolation.is_empty() {
        return Err(NameError::MissingField("isolation"));
    }

    let mut passage = passage_head.trim().to_string();
    for tail in &fields[year_at + 1..] {
        passage.push('/');
        passage.push_str(tail);
    }

    Ok(NameParts {
        virus_type: virus_type.to_string(),
        host: host.to_string(),
        location: location.to_string(),
        isolation: isolation.to_string(),
        year: year.to_string(),
        passage: passage.trim().to_string(),
    })
}

/// A CDC-style name: longer than three characters with a space in third position
#[must_use]
pub fn is_cdc_name(name: &str) -> bool {
    name.chars().count() > 3 && name.chars().nth(2) == Some(' ')
}

/// Split `2009 E3` into (`2009`, ` E3`). The digit run must be 2 or 4 long and
/// be followed by the end of the field or whitespace.
fn parse_year_field(field: &str) -> Option<(&str, &str)> {
    let digits = field.bytes().take_while(u8::is_ascii_digit).count();
    if digits != 2 && digits != 4 {
        return None;
    }
    let (year, rest) = field.split_at(digits);
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some((year, rest))
    } else {
        None
    }
}

fn is_virus_type(s: &str) -> bool {
    s == "A" || s == "B" || (s.starts_with("A(H") && s.ends_with(')'))
}
