use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::arena::{CatalogKey, SortedArena};
use crate::catalog::index::NameIndex;
use crate::core::antigen::{join_full_name, Antigen, AntigenSerum, Serum};
use crate::core::chart::{Chart, ChartDescriptor};
use crate::core::location::LocationService;
use crate::core::types::TableId;
use crate::parsing::chart::{is_gzipped, open_reader};

#[derive(Error, Debug)]
pub enum HiDbError {
    #[error("Chart {0} already in hidb")]
    DuplicateTable(TableId),

    #[error("Not found: {name} ({} candidates)", .candidates.len())]
    NotFound {
        name: String,
        /// Full names of the entries that were considered
        candidates: Vec<String>,
    },

    #[error("No hidb for virus type {0}")]
    UnsupportedCatalog(String),

    #[error("Name index is stale: rebuild it after merging charts")]
    StaleIndex,

    #[error("Failed to read or write hidb: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse hidb: {0}")]
    Json(#[from] serde_json::Error),
}

/// Snapshot format version
pub const SNAPSHOT_VERSION: &str = "hidb-v4";

/// Membership of a canonical record in one source table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerTable {
    pub table_id: TableId,
    /// Antigen collection date as recorded in that table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// Homologous antigen of a serum in one source table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomologousLink {
    pub table_id: TableId,
    pub antigen_variant_id: String,
}

/// Insert `entry` keeping `per_table` sorted by table id. Re-adding a table is a no-op.
fn add_per_table(per_table: &mut Vec<PerTable>, entry: PerTable) {
    if let Err(pos) = per_table.binary_search_by(|e| e.table_id.cmp(&entry.table_id)) {
        per_table.insert(pos, entry);
    }
}

/// Deduplicated antigen across all imported tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalAntigen {
    #[serde(flatten)]
    pub data: AntigenSerum,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub variant_id: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lab_id: Vec<String>,

    /// Ordered by table id, oldest first
    pub per_table: Vec<PerTable>,
}

impl CanonicalAntigen {
    fn from_antigen(antigen: &Antigen) -> Self {
        Self {
            data: antigen.data.clone(),
            variant_id: antigen.variant_id(),
            lab_id: Vec::new(),
            per_table: Vec::new(),
        }
    }

    fn update(&mut self, table_id: &TableId, antigen: &Antigen) {
        for lab_id in &antigen.lab_id {
            if !self.lab_id.contains(lab_id) {
                self.lab_id.push(lab_id.clone());
            }
        }
        add_per_table(
            &mut self.per_table,
            PerTable {
                table_id: table_id.clone(),
                date: (!antigen.date.is_empty()).then(|| antigen.date.clone()),
            },
        );
    }

    /// Name plus qualifiers
    #[must_use]
    pub fn full_name(&self) -> String {
        join_full_name(&self.data.name, &self.variant_id)
    }

    /// The string [`find_antigens_exact`](crate::QueryEngine::find_antigens_exact) compares against
    #[must_use]
    pub fn name_for_exact_matching(&self) -> String {
        self.full_name()
    }

    /// Latest collection date known from any table, empty if none
    #[must_use]
    pub fn date(&self) -> &str {
        self.per_table
            .iter()
            .filter_map(|e| e.date.as_deref())
            .max()
            .unwrap_or("")
    }

    #[must_use]
    pub fn most_recent_table(&self) -> Option<&PerTable> {
        self.per_table.last()
    }

    #[must_use]
    pub fn number_of_tables(&self) -> usize {
        self.per_table.len()
    }

    #[must_use]
    pub fn has_lab_id(&self, lab_id: &str) -> bool {
        self.lab_id.iter().any(|id| id == lab_id)
    }
}

impl CatalogKey for CanonicalAntigen {
    fn name(&self) -> &str {
        &self.data.name
    }

    fn variant_id(&self) -> &str {
        &self.variant_id
    }
}

/// Deduplicated serum across all imported tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalSerum {
    #[serde(flatten)]
    pub data: AntigenSerum,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub serum_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub serum_species: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub variant_id: String,

    pub per_table: Vec<PerTable>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub homologous: Vec<HomologousLink>,
}

impl CanonicalSerum {
    fn from_serum(serum: &Serum) -> Self {
        Self {
            data: serum.data.clone(),
            serum_id: serum.serum_id.clone(),
            serum_species: serum.serum_species.clone(),
            variant_id: serum.variant_id(),
            per_table: Vec::new(),
            homologous: Vec::new(),
        }
    }

    fn update(&mut self, table_id: &TableId) {
        add_per_table(
            &mut self.per_table,
            PerTable {
                table_id: table_id.clone(),
                date: None,
            },
        );
    }

    fn set_homologous(&mut self, table_id: &TableId, antigen_variant_id: String) {
        match self
            .homologous
            .binary_search_by(|link| link.table_id.cmp(table_id))
        {
            Ok(pos) => self.homologous[pos].antigen_variant_id = antigen_variant_id,
            Err(pos) => self.homologous.insert(
                pos,
                HomologousLink {
                    table_id: table_id.clone(),
                    antigen_variant_id,
                },
            ),
        }
    }

    /// Variant id of the homologous antigen in the given table
    #[must_use]
    pub fn homologous_for(&self, table_id: &TableId) -> Option<&str> {
        self.homologous
            .iter()
            .find(|link| &link.table_id == table_id)
            .map(|link| link.antigen_variant_id.as_str())
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        join_full_name(&self.data.name, &self.variant_id)
    }

    #[must_use]
    pub fn name_for_exact_matching(&self) -> String {
        self.full_name()
    }

    #[must_use]
    pub fn most_recent_table(&self) -> Option<&PerTable> {
        self.per_table.last()
    }

    #[must_use]
    pub fn number_of_tables(&self) -> usize {
        self.per_table.len()
    }
}

impl CatalogKey for CanonicalSerum {
    fn name(&self) -> &str {
        &self.data.name
    }

    fn variant_id(&self) -> &str {
        &self.variant_id
    }
}

/// What a single [`HiDb::merge`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub table_id: TableId,
    pub new_antigens: usize,
    pub new_sera: usize,
    /// Chart-local records flagged distinct and kept out of the catalog
    pub skipped: usize,
}

/// Serializable snapshot format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: String,
    pub created_at: String,
    pub antigens: Vec<CanonicalAntigen>,
    pub sera: Vec<CanonicalSerum>,
    pub charts: Vec<ChartDescriptor>,
}

/// The merged catalog of antigens and sera from all imported charts
#[derive(Debug, Default)]
pub struct HiDb {
    antigens: SortedArena<CanonicalAntigen>,
    sera: SortedArena<CanonicalSerum>,
    charts: BTreeMap<TableId, ChartDescriptor>,

    /// Bumped on every mutation; the index remembers the one it was built for
    generation: u64,
    index: NameIndex,
}

impl HiDb {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one chart into the catalog.
    ///
    /// Invalidates the name index; call [`HiDb::rebuild_index`] after the batch.
    ///
    /// # Errors
    ///
    /// Returns `HiDbError::DuplicateTable` if a chart with the same table id was
    /// already merged. The catalog is left untouched in that case.
    pub fn merge(&mut self, chart: &Chart) -> Result<MergeSummary, HiDbError> {
        let table_id = chart.table_id();
        if self.charts.contains_key(&table_id) {
            return Err(HiDbError::DuplicateTable(table_id));
        }
        self.charts
            .insert(table_id.clone(), ChartDescriptor::from_chart(chart));

        let mut summary = MergeSummary {
            table_id: table_id.clone(),
            new_antigens: 0,
            new_sera: 0,
            skipped: 0,
        };

        for antigen in &chart.antigens {
            if antigen.distinct {
                summary.skipped += 1;
            } else if self.add_antigen(antigen, &table_id) {
                summary.new_antigens += 1;
            }
        }
        for serum in &chart.sera {
            if serum.distinct {
                summary.skipped += 1;
            } else if self.add_serum(serum, &table_id, &chart.antigens) {
                summary.new_sera += 1;
            }
        }

        self.generation += 1;
        debug!(
            "Merged {}: {} new antigens, {} new sera, {} distinct skipped",
            table_id, summary.new_antigens, summary.new_sera, summary.skipped
        );
        Ok(summary)
    }

    /// Returns true when a new canonical antigen was created
    fn add_antigen(&mut self, antigen: &Antigen, table_id: &TableId) -> bool {
        let variant_id = antigen.variant_id();
        let (id, created) =
            self.antigens
                .find_or_insert_with(&antigen.data.name, &variant_id, || {
                    CanonicalAntigen::from_antigen(antigen)
                });
        if let Some(record) = self.antigens.get_mut(id) {
            record.update(table_id, antigen);
        }
        created
    }

    fn add_serum(&mut self, serum: &Serum, table_id: &TableId, antigens: &[Antigen]) -> bool {
        let variant_id = serum.variant_id();
        let (id, created) = self
            .sera
            .find_or_insert_with(&serum.data.name, &variant_id, || {
                CanonicalSerum::from_serum(serum)
            });
        let Some(record) = self.sera.get_mut(id) else {
            return created;
        };
        record.update(table_id);
        if let Some(antigen_no) = serum.homologous {
            match antigens.get(antigen_no) {
                Some(antigen) => record.set_homologous(table_id, antigen.variant_id()),
                None => warn!(
                    "{}: serum {} refers to homologous antigen {} but chart has {} antigens",
                    table_id,
                    serum.full_name(),
                    antigen_no,
                    antigens.len()
                ),
            }
        }
        created
    }

    /// Rebuild the name index from the current antigens
    pub fn rebuild_index(&mut self, locations: &dyn LocationService) {
        self.index = NameIndex::build(&self.antigens, locations, self.generation);
    }

    /// Whether the index reflects the current catalog contents
    #[must_use]
    pub fn is_indexed(&self) -> bool {
        self.index.generation() == self.generation
    }

    #[must_use]
    pub fn index(&self) -> &NameIndex {
        &self.index
    }

    #[must_use]
    pub fn antigens(&self) -> &SortedArena<CanonicalAntigen> {
        &self.antigens
    }

    #[must_use]
    pub fn sera(&self) -> &SortedArena<CanonicalSerum> {
        &self.sera
    }

    /// Imported charts ordered by table id
    #[must_use]
    pub fn charts(&self) -> &BTreeMap<TableId, ChartDescriptor> {
        &self.charts
    }

    #[must_use]
    pub fn chart(&self, table_id: &TableId) -> Option<&ChartDescriptor> {
        self.charts.get(table_id)
    }

    /// Distinct antigen names in catalog order
    #[must_use]
    pub fn list_antigen_names(&self) -> Vec<String> {
        unique_names(self.antigens.iter().map(|(_, a)| a.data.name.as_str()))
    }

    /// Distinct serum names in catalog order
    #[must_use]
    pub fn list_serum_names(&self) -> Vec<String> {
        unique_names(self.sera.iter().map(|(_, s)| s.data.name.as_str()))
    }

    /// Restore from a snapshot. The record order is trusted; the index is
    /// left stale until [`HiDb::rebuild_index`].
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        if snapshot.version != SNAPSHOT_VERSION {
            warn!(
                "Snapshot version mismatch (expected {}, found {})",
                SNAPSHOT_VERSION, snapshot.version
            );
        }
        Self {
            antigens: SortedArena::from_sorted(snapshot.antigens),
            sera: SortedArena::from_sorted(snapshot.sera),
            charts: snapshot
                .charts
                .into_iter()
                .map(|chart| (chart.table_id.clone(), chart))
                .collect(),
            generation: 1,
            index: NameIndex::default(),
        }
    }

    #[must_use]
    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            antigens: self.antigens.iter().map(|(_, a)| a.clone()).collect(),
            sera: self.sera.iter().map(|(_, s)| s.clone()).collect(),
            charts: self.charts.values().cloned().collect(),
        }
    }

    /// Parse a snapshot from a JSON string
    ///
    /// # Errors
    ///
    /// Returns `HiDbError::Json` if the text is not a valid snapshot.
    pub fn from_json(json: &str) -> Result<Self, HiDbError> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// # Errors
    ///
    /// Returns `HiDbError::Json` if serialization fails.
    pub fn to_json(&self, pretty: bool) -> Result<String, HiDbError> {
        let snapshot = self.to_snapshot();
        Ok(if pretty {
            serde_json::to_string_pretty(&snapshot)?
        } else {
            serde_json::to_string(&snapshot)?
        })
    }

    /// Load a snapshot file, gzip-compressed when the name ends in `.gz`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid snapshot.
    pub fn load(path: &Path) -> Result<Self, HiDbError> {
        let reader = open_reader(path)?;
        let snapshot: Snapshot = serde_json::from_reader(reader)?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Save a snapshot file, gzip-compressed when the name ends in `.gz`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn save(&self, path: &Path, pretty: bool) -> Result<(), HiDbError> {
        let json = self.to_json(pretty)?;
        let file = std::fs::File::create(path)?;
        if is_gzipped(path) {
            let mut encoder =
                flate2::write::GzEncoder::new(file, flate2::Compression::default());
            encoder.write_all(json.as_bytes())?;
            encoder.finish()?;
        } else {
            let mut writer = std::io::BufWriter::new(file);
            writer.write_all(json.as_bytes())?;
            writer.flush()?;
        }
        Ok(())
    }
}

fn unique_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();
    for name in names {
        if result.last().map(String::as_str) != Some(name) {
            result.push(name.to_string());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chart::ChartInfo;

    fn chart(table_id: &str, antigens: Vec<Antigen>, sera: Vec<Serum>) -> Chart {
        Chart::new(ChartInfo {
            virus_type: "A(H3N2)".to_string(),
            lab: "CDC".to_string(),
            ..ChartInfo::default()
        })
        .with_table_id(table_id)
        .with_antigens(antigens)
        .with_sera(sera)
    }

    #[test]
    fn test_merge_inserts_sorted() {
        let mut hidb = HiDb::new();
        hidb.merge(&chart(
            "t1",
            vec![
                Antigen::new("A(H3N2)/VICTORIA/361/2011"),
                Antigen::new("A(H3N2)/PERTH/16/2009").with_passage("E3"),
                Antigen::new("A(H3N2)/PERTH/16/2009"),
            ],
            vec![],
        ))
        .unwrap();

        assert!(hidb.antigens().is_sorted());
        let full_names: Vec<_> = hidb.antigens().iter().map(|(_, a)| a.full_name()).collect();
        assert_eq!(
            full_names,
            vec![
                "A(H3N2)/PERTH/16/2009",
                "A(H3N2)/PERTH/16/2009 E3",
                "A(H3N2)/VICTORIA/361/2011"
            ]
        );
    }

    #[test]
    fn test_merge_shared_antigen_accumulates_tables() {
        let mut hidb = HiDb::new();
        let perth = || Antigen::new("A(H3N2)/PERTH/16/2009").with_passage("E3");
        hidb.merge(&chart("t2", vec![perth().with_date("2009-06-01")], vec![]))
            .unwrap();
        let summary = hidb
            .merge(&chart("t1", vec![perth().with_lab_id("CDC#1")], vec![]))
            .unwrap();
        assert_eq!(summary.new_antigens, 0);

        assert_eq!(hidb.antigens().len(), 1);
        let (_, antigen) = hidb.antigens().iter().next().unwrap();
        assert_eq!(antigen.number_of_tables(), 2);
        assert_eq!(antigen.per_table[0].table_id, TableId::new("t1"));
        assert_eq!(
            antigen.most_recent_table().unwrap().table_id,
            TableId::new("t2")
        );
        assert_eq!(antigen.date(), "2009-06-01");
        assert!(antigen.has_lab_id("CDC#1"));
    }

    #[test]
    fn test_duplicate_table_is_rejected_and_catalog_unchanged() {
        let mut hidb = HiDb::new();
        let c = chart("t1", vec![Antigen::new("B/BRISBANE/60/2008")], vec![]);
        hidb.merge(&c).unwrap();
        let before = hidb.antigens().iter().next().unwrap().1.number_of_tables();

        let err = hidb.merge(&c).unwrap_err();
        assert!(matches!(err, HiDbError::DuplicateTable(ref id) if id.as_str() == "t1"));
        assert_eq!(hidb.antigens().len(), 1);
        assert_eq!(hidb.charts().len(), 1);
        assert_eq!(
            hidb.antigens().iter().next().unwrap().1.number_of_tables(),
            before
        );
    }

    #[test]
    fn test_distinct_records_are_not_merged() {
        let mut hidb = HiDb::new();
        let mut distinct = Antigen::new("A(H3N2)/PERTH/16/2009");
        distinct.distinct = true;
        let summary = hidb
            .merge(&chart("t1", vec![distinct, Antigen::new("B/BRISBANE/60/2008")], vec![]))
            .unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(hidb.antigens().len(), 1);
        // the chart itself still lists both
        assert_eq!(hidb.chart(&TableId::new("t1")).unwrap().antigens.len(), 2);
    }

    #[test]
    fn test_serum_homologous_link_resolved_by_position() {
        let mut hidb = HiDb::new();
        hidb.merge(&chart(
            "t1",
            vec![
                Antigen::new("B/BRISBANE/60/2008"),
                Antigen::new("A(H3N2)/PERTH/16/2009").with_passage("E3"),
            ],
            vec![
                Serum::new("A(H3N2)/PERTH/16/2009")
                    .with_serum_id("F1")
                    .with_homologous(1),
                Serum::new("B/BRISBANE/60/2008")
                    .with_serum_id("F2")
                    .with_homologous(7),
            ],
        ))
        .unwrap();

        let perth = hidb
            .sera()
            .iter()
            .find(|(_, s)| s.data.name == "A(H3N2)/PERTH/16/2009")
            .unwrap()
            .1;
        assert_eq!(perth.homologous_for(&TableId::new("t1")), Some("E3"));

        // out-of-range homologous index is skipped, the serum is still merged
        let brisbane = hidb
            .sera()
            .iter()
            .find(|(_, s)| s.data.name == "B/BRISBANE/60/2008")
            .unwrap()
            .1;
        assert!(brisbane.homologous.is_empty());
        assert_eq!(brisbane.number_of_tables(), 1);
    }

    #[test]
    fn test_merge_invalidates_index() {
        let mut hidb = HiDb::new();
        assert!(hidb.is_indexed());
        hidb.merge(&chart("t1", vec![Antigen::new("B/BRISBANE/60/2008")], vec![]))
            .unwrap();
        assert!(!hidb.is_indexed());
        hidb.rebuild_index(&crate::core::location::LocDb::new());
        assert!(hidb.is_indexed());
    }

    #[test]
    fn test_list_names_are_unique() {
        let mut hidb = HiDb::new();
        hidb.merge(&chart(
            "t1",
            vec![
                Antigen::new("A(H3N2)/PERTH/16/2009"),
                Antigen::new("A(H3N2)/PERTH/16/2009").with_passage("E3"),
                Antigen::new("A(H3N2)/PERTH/16/2009").with_passage("MDCK1"),
            ],
            vec![
                Serum::new("A(H3N2)/PERTH/16/2009").with_serum_id("F1"),
                Serum::new("A(H3N2)/PERTH/16/2009").with_serum_id("F2"),
            ],
        ))
        .unwrap();
        assert_eq!(hidb.list_antigen_names(), vec!["A(H3N2)/PERTH/16/2009"]);
        assert_eq!(hidb.list_serum_names(), vec!["A(H3N2)/PERTH/16/2009"]);
    }

    #[test]
    fn test_snapshot_round_trip_leaves_index_stale() {
        let mut hidb = HiDb::new();
        hidb.merge(&chart(
            "t1",
            vec![
                Antigen::new("B/BRISBANE/60/2008"),
                Antigen::new("A(H3N2)/PERTH/16/2009"),
            ],
            vec![Serum::new("B/BRISBANE/60/2008").with_homologous(0)],
        ))
        .unwrap();

        let json = hidb.to_json(false).unwrap();
        let restored = HiDb::from_json(&json).unwrap();
        assert!(!restored.is_indexed());
        assert!(restored.antigens().is_sorted());
        assert_eq!(restored.antigens().len(), 2);
        assert_eq!(restored.sera().len(), 1);
        assert_eq!(restored.charts().len(), 1);
        assert!(restored
            .antigens()
            .find("A(H3N2)/PERTH/16/2009", "")
            .is_some());
    }
}
