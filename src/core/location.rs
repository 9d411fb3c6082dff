//! Location lookup used for index keys, country filtering and statistics.
//!
//! The catalog only depends on the [`LocationService`] trait; [`LocDb`] is the
//! in-memory implementation loaded from a location database file.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Location not found: {0}")]
pub struct LocationNotFound(pub String);

/// Canonical form of a place name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub name: String,
    pub country: String,
    pub continent: String,
}

pub trait LocationService {
    /// Resolve a place name (or one of its aliases) to its canonical form
    ///
    /// # Errors
    ///
    /// Returns [`LocationNotFound`] when the text is not a known location.
    fn resolve(&self, text: &str) -> Result<Location, LocationNotFound>;

    /// Resolve a two-letter CDC location abbreviation
    ///
    /// # Errors
    ///
    /// Returns [`LocationNotFound`] when the abbreviation is unknown.
    fn resolve_cdc_abbreviation(&self, abbreviation: &str) -> Result<Location, LocationNotFound>;

    fn find(&self, text: &str) -> bool {
        self.resolve(text).is_ok()
    }

    /// # Errors
    ///
    /// Returns [`LocationNotFound`] when the text is not a known location.
    fn country(&self, text: &str) -> Result<String, LocationNotFound> {
        self.resolve(text).map(|location| location.country)
    }

    /// Continent of a location, `default` when it is not known
    fn continent_or(&self, text: &str, default: &str) -> String {
        self.resolve(text)
            .map_or_else(|_| default.to_string(), |location| location.continent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationEntry {
    pub country: String,
    pub continent: String,
}

/// In-memory location database. Keys are upper case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocDb {
    #[serde(default)]
    locations: HashMap<String, LocationEntry>,

    /// alias -> canonical name
    #[serde(default)]
    aliases: HashMap<String, String>,

    /// two-letter abbreviation -> canonical name
    #[serde(default)]
    cdc_abbreviations: HashMap<String, String>,
}

impl LocDb {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_location(
        mut self,
        name: &str,
        country: impl Into<String>,
        continent: impl Into<String>,
    ) -> Self {
        self.locations.insert(
            name.to_uppercase(),
            LocationEntry {
                country: country.into(),
                continent: continent.into(),
            },
        );
        self
    }

    #[must_use]
    pub fn with_alias(mut self, alias: &str, name: &str) -> Self {
        self.aliases.insert(alias.to_uppercase(), name.to_uppercase());
        self
    }

    #[must_use]
    pub fn with_cdc_abbreviation(mut self, abbreviation: &str, name: &str) -> Self {
        self.cdc_abbreviations
            .insert(abbreviation.to_uppercase(), name.to_uppercase());
        self
    }

    /// Upper-case every key, as loaded files may use any case
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            locations: self
                .locations
                .into_iter()
                .map(|(k, v)| (k.to_uppercase(), v))
                .collect(),
            aliases: self
                .aliases
                .into_iter()
                .map(|(k, v)| (k.to_uppercase(), v.to_uppercase()))
                .collect(),
            cdc_abbreviations: self
                .cdc_abbreviations
                .into_iter()
                .map(|(k, v)| (k.to_uppercase(), v.to_uppercase()))
                .collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    fn canonical(&self, name: &str) -> Option<Location> {
        self.locations.get(name).map(|entry| Location {
            name: name.to_string(),
            country: entry.country.clone(),
            continent: entry.continent.clone(),
        })
    }
}

impl LocationService for LocDb {
    fn resolve(&self, text: &str) -> Result<Location, LocationNotFound> {
        let key = text.trim().to_uppercase();
        self.canonical(&key)
            .or_else(|| {
                self.aliases
                    .get(&key)
                    .and_then(|name| self.canonical(name))
            })
            .ok_or_else(|| LocationNotFound(text.to_string()))
    }

    fn resolve_cdc_abbreviation(&self, abbreviation: &str) -> Result<Location, LocationNotFound> {
        let key = abbreviation.trim().to_uppercase();
        self.cdc_abbreviations
            .get(&key)
            .and_then(|name| self.canonical(name))
            .ok_or_else(|| LocationNotFound(abbreviation.to_string()))
    }
}
