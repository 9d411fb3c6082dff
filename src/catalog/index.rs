use std::collections::HashMap;
use tracing::debug;

use crate::catalog::arena::SortedArena;
use crate::catalog::store::CanonicalAntigen;
use crate::core::location::LocationService;
use crate::core::name::{self, is_cdc_name};
use crate::core::types::RecordId;

/// Width of the location-derived index key
pub const INDEX_KEY_SIZE: usize = 4;

/// Fixed-width prefix of a canonical location name
#[must_use]
pub fn index_key(canonical_location: &str) -> String {
    canonical_location.chars().take(INDEX_KEY_SIZE).collect()
}

/// Key for a CDC-style name (`HK 1/2009`): derived from the location behind
/// its two-letter abbreviation, or from the raw text when the abbreviation
/// is unknown.
#[must_use]
pub fn cdc_index_key(name: &str, locations: &dyn LocationService) -> String {
    let abbreviation: String = name.chars().take(2).collect();
    match locations.resolve_cdc_abbreviation(&abbreviation) {
        Ok(location) => index_key(&location.name),
        Err(_) => index_key(name),
    }
}

/// Location-keyed buckets of antigen ids, in catalog order.
///
/// Built from one catalog generation; the catalog refuses queries through an
/// index whose generation is behind its own.
#[derive(Debug, Default, Clone)]
pub struct NameIndex {
    buckets: HashMap<String, Vec<RecordId>>,
    generation: u64,
}

impl NameIndex {
    /// Bucket every antigen whose name decomposes (or is CDC-shaped).
    /// Names that do neither, or whose location is unknown, are left out.
    #[must_use]
    pub fn build(
        antigens: &SortedArena<CanonicalAntigen>,
        locations: &dyn LocationService,
        generation: u64,
    ) -> Self {
        let mut buckets: HashMap<String, Vec<RecordId>> = HashMap::new();
        let mut unindexed = 0usize;

        for (id, antigen) in antigens.iter() {
            let name = antigen.data.name.as_str();
            let key = match name::split(name) {
                Ok(parts) => match locations.resolve(&parts.location) {
                    Ok(location) => index_key(&location.name),
                    Err(_) => {
                        unindexed += 1;
                        continue;
                    }
                },
                Err(_) if is_cdc_name(name) => cdc_index_key(name, locations),
                Err(_) => {
                    unindexed += 1;
                    continue;
                }
            };
            buckets.entry(key).or_default().push(id);
        }

        debug!(
            "Name index: {} antigens in {} buckets, {} not indexed",
            antigens.len() - unindexed,
            buckets.len(),
            unindexed
        );
        Self {
            buckets,
            generation,
        }
    }

    #[must_use]
    pub fn bucket(&self, key: &str) -> Option<&[RecordId]> {
        self.buckets.get(key).map(Vec::as_slice)
    }

    /// Catalog generation the index was built from
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of buckets
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
