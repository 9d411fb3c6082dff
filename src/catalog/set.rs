//! Per-virus-type catalogs opened on demand from a directory of snapshots.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::catalog::store::{HiDb, HiDbError};
use crate::core::location::LocDb;
use crate::core::types::VirusType;
use crate::matching::engine::{QueryConfig, QueryEngine};

/// Cache of indexed catalogs keyed by virus type.
///
/// Snapshots are looked up as `hidb.<tag>.json.gz` (preferred) or
/// `hidb.<tag>.json` in the catalog directory, with `<tag>` one of
/// `h1`, `h3`, `b`.
pub struct CatalogSet {
    dir: PathBuf,
    locations: LocDb,
    catalogs: HashMap<VirusType, HiDb>,
}

impl CatalogSet {
    pub fn new(dir: impl Into<PathBuf>, locations: LocDb) -> Self {
        Self {
            dir: dir.into(),
            locations,
            catalogs: HashMap::new(),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn locations(&self) -> &LocDb {
        &self.locations
    }

    /// Snapshot file for a virus type; the compressed name unless only the
    /// plain one exists
    #[must_use]
    pub fn snapshot_path(&self, virus_type: VirusType) -> PathBuf {
        let compressed = self
            .dir
            .join(format!("hidb.{}.json.gz", virus_type.file_tag()));
        let plain = self.dir.join(format!("hidb.{}.json", virus_type.file_tag()));
        if !compressed.exists() && plain.exists() {
            plain
        } else {
            compressed
        }
    }

    /// Put an in-memory catalog into the cache, indexing it
    pub fn insert(&mut self, virus_type: VirusType, mut hidb: HiDb) {
        hidb.rebuild_index(&self.locations);
        self.catalogs.insert(virus_type, hidb);
    }

    /// The catalog for `virus_type`, loading and indexing it on first access
    ///
    /// # Errors
    ///
    /// Returns `HiDbError::UnsupportedCatalog` for an unknown virus type and
    /// an I/O or JSON error if the snapshot cannot be loaded.
    pub fn get(&mut self, virus_type: &str) -> Result<&HiDb, HiDbError> {
        let virus_type = parse_virus_type(virus_type)?;
        self.ensure_loaded(virus_type)?;
        self.catalogs
            .get(&virus_type)
            .ok_or_else(|| HiDbError::UnsupportedCatalog(virus_type.to_string()))
    }

    /// A query engine over the catalog for `virus_type`
    ///
    /// # Errors
    ///
    /// Same as [`CatalogSet::get`].
    pub fn engine(&mut self, virus_type: &str) -> Result<QueryEngine<'_>, HiDbError> {
        self.engine_with_config(virus_type, QueryConfig::default())
    }

    /// # Errors
    ///
    /// Same as [`CatalogSet::get`].
    pub fn engine_with_config(
        &mut self,
        virus_type: &str,
        config: QueryConfig,
    ) -> Result<QueryEngine<'_>, HiDbError> {
        let virus_type = parse_virus_type(virus_type)?;
        self.ensure_loaded(virus_type)?;
        let hidb = self
            .catalogs
            .get(&virus_type)
            .ok_or_else(|| HiDbError::UnsupportedCatalog(virus_type.to_string()))?;
        QueryEngine::with_config(hidb, &self.locations, config)
    }

    /// Drop a cached catalog; the next access reads the snapshot again.
    /// Returns whether anything was cached.
    pub fn invalidate(&mut self, virus_type: VirusType) -> bool {
        self.catalogs.remove(&virus_type).is_some()
    }

    /// Re-read the snapshot for `virus_type` now
    ///
    /// # Errors
    ///
    /// Returns an I/O or JSON error if the snapshot cannot be loaded. The
    /// previously cached catalog is dropped either way.
    pub fn reload(&mut self, virus_type: VirusType) -> Result<&HiDb, HiDbError> {
        self.invalidate(virus_type);
        self.ensure_loaded(virus_type)?;
        self.catalogs
            .get(&virus_type)
            .ok_or_else(|| HiDbError::UnsupportedCatalog(virus_type.to_string()))
    }

    fn ensure_loaded(&mut self, virus_type: VirusType) -> Result<(), HiDbError> {
        if self.catalogs.contains_key(&virus_type) {
            return Ok(());
        }
        let path = self.snapshot_path(virus_type);
        debug!("Loading {} hidb from {}", virus_type, path.display());
        let mut hidb = HiDb::load(&path)?;
        hidb.rebuild_index(&self.locations);
        info!(
            "Loaded {} hidb: {} antigens, {} sera, {} tables",
            virus_type,
            hidb.antigens().len(),
            hidb.sera().len(),
            hidb.charts().len()
        );
        self.catalogs.insert(virus_type, hidb);
        Ok(())
    }
}

fn parse_virus_type(virus_type: &str) -> Result<VirusType, HiDbError> {
    VirusType::parse(virus_type).ok_or_else(|| HiDbError::UnsupportedCatalog(virus_type.to_string()))
}
