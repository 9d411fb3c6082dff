use tracing::{debug, warn};

use crate::catalog::arena::CatalogKey;
use crate::catalog::index::{cdc_index_key, index_key};
use crate::catalog::store::{CanonicalAntigen, CanonicalSerum, HiDb, HiDbError};
use crate::core::location::LocationService;
use crate::core::name::{self, is_cdc_name, NameParts};
use crate::core::types::RecordId;
use crate::matching::refs::AntigenRefs;
use crate::matching::scoring::{keep_best, score_candidates, FullScore, Scored};

/// Configuration for the query engine
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Score at most this many candidates per query, in catalog order
    pub candidate_limit: Option<usize>,
    /// Leave out entries sharing no characters with the query at all
    pub drop_zero_name_scores: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            candidate_limit: None,
            drop_zero_name_scores: false,
        }
    }
}

/// Read-only query surface over an indexed catalog.
///
/// Borrowing the catalog keeps merges out while an engine is alive.
pub struct QueryEngine<'a> {
    hidb: &'a HiDb,
    locations: &'a dyn LocationService,
    config: QueryConfig,
}

impl<'a> QueryEngine<'a> {
    /// Create a query engine with default configuration
    ///
    /// # Errors
    ///
    /// Returns `HiDbError::StaleIndex` if charts were merged (or a snapshot
    /// restored) since the last [`HiDb::rebuild_index`].
    pub fn new(hidb: &'a HiDb, locations: &'a dyn LocationService) -> Result<Self, HiDbError> {
        Self::with_config(hidb, locations, QueryConfig::default())
    }

    /// Create a query engine with custom configuration
    ///
    /// # Errors
    ///
    /// Returns `HiDbError::StaleIndex` if the name index is out of date.
    pub fn with_config(
        hidb: &'a HiDb,
        locations: &'a dyn LocationService,
        config: QueryConfig,
    ) -> Result<Self, HiDbError> {
        if !hidb.is_indexed() {
            return Err(HiDbError::StaleIndex);
        }
        Ok(Self {
            hidb,
            locations,
            config,
        })
    }

    #[must_use]
    pub fn hidb(&self) -> &'a HiDb {
        self.hidb
    }

    #[must_use]
    pub fn locations(&self) -> &'a dyn LocationService {
        self.locations
    }

    /// Every antigen, in catalog order
    #[must_use]
    pub fn all_antigens(&self) -> AntigenRefs<'a> {
        self.refs(self.hidb.antigens().ids().to_vec())
    }

    /// Antigens that may match `text`, narrowed through the name index.
    ///
    /// Decomposable names select the bucket of their canonical location and
    /// keep entries agreeing on host, location, isolation and year. CDC-style
    /// names go through [`Self::find_cdc_candidates`]. Anything else, or an
    /// unknown location, yields an empty list.
    #[must_use]
    pub fn find_candidates(&self, text: &str) -> AntigenRefs<'a> {
        let query = normalize_query(text);
        let ids = match name::split(&query) {
            Ok(parts) => self.find_by_fields(&parts),
            Err(_) if is_cdc_name(&query) => self.find_cdc_candidates(text.trim()),
            Err(_) => Vec::new(),
        };
        self.refs(ids)
    }

    fn find_by_fields(&self, query: &NameParts) -> Vec<RecordId> {
        let location = match self.locations.resolve(&query.location) {
            Ok(location) => location,
            Err(err) => {
                warn!("{err}");
                return Vec::new();
            }
        };
        let Some(bucket) = self.hidb.index().bucket(&index_key(&location.name)) else {
            return Vec::new();
        };

        let antigens = self.hidb.antigens();
        bucket
            .iter()
            .copied()
            .filter(|&id| {
                let Ok(parts) = name::split(&antigens[id].data.name) else {
                    return false;
                };
                let entry_location = self
                    .locations
                    .resolve(&parts.location)
                    .map_or(parts.location, |l| l.name);
                parts.host == query.host
                    && entry_location == location.name
                    && parts.isolation == query.isolation
                    && parts.year == query.year
            })
            .collect()
    }

    /// Lookup for CDC-style names (`HK 1/2009`): an exact full-name match
    /// wins, then entries sharing the text up to the first space after the
    /// abbreviation, then, as a loose suggestion list, every entry sharing
    /// the two-letter abbreviation. The full-name step compares `text` as
    /// given, the later steps its upper-case form.
    fn find_cdc_candidates(&self, text: &str) -> Vec<RecordId> {
        let name = normalize_query(text);
        let Some(bucket) = self.hidb.index().bucket(&cdc_index_key(&name, self.locations)) else {
            debug!("{name}: not a recognized CDC name");
            return Vec::new();
        };
        let antigens = self.hidb.antigens();

        if let Some(&id) = bucket.iter().find(|&&id| antigens[id].full_name() == text) {
            return vec![id];
        }

        let prefix_end = name
            .get(3..)
            .and_then(|rest| rest.find(' '))
            .map_or(name.len(), |pos| pos + 3);
        let prefix = &name[..prefix_end];
        let by_prefix: Vec<RecordId> = bucket
            .iter()
            .copied()
            .filter(|&id| antigens[id].full_name().starts_with(prefix))
            .collect();
        if !by_prefix.is_empty() {
            return by_prefix;
        }

        let abbreviation: String = name.chars().take(2).collect();
        bucket
            .iter()
            .copied()
            .filter(|&id| antigens[id].data.name.starts_with(&abbreviation))
            .collect()
    }

    /// Score candidates and sort them for ranking
    fn score<T: CatalogKey + 'a>(
        &self,
        query: &str,
        candidates: impl Iterator<Item = (RecordId, &'a T)>,
    ) -> Vec<Scored<'a, T>> {
        let limit = self.config.candidate_limit.unwrap_or(usize::MAX);
        let mut scored = score_candidates(query, candidates.take(limit));
        if self.config.drop_zero_name_scores {
            scored.retain(|s| s.score.name > 0);
        }
        scored
    }

    /// [`Self::score`], keeping only entries with the best name score
    fn rank<T: CatalogKey + 'a>(
        &self,
        query: &str,
        candidates: impl Iterator<Item = (RecordId, &'a T)>,
    ) -> Vec<Scored<'a, T>> {
        keep_best(self.score(query, candidates))
    }

    /// Best matching antigens for a name with optional qualifiers
    #[must_use]
    pub fn find_antigens(&self, text: &str) -> Vec<&'a CanonicalAntigen> {
        self.find_antigens_scored(text)
            .into_iter()
            .map(|s| s.record)
            .collect()
    }

    /// [`Self::find_antigens`] with the scores kept
    #[must_use]
    pub fn find_antigens_scored(&self, text: &str) -> Vec<Scored<'a, CanonicalAntigen>> {
        let query = normalize_query(text);
        let candidates = self.find_candidates(text);
        self.rank(&query, candidates.entries())
    }

    /// Rank every antigen in the catalog, bypassing the index, and keep the
    /// best name-score tier with each entry's full score
    #[must_use]
    pub fn find_antigens_with_score(&self, text: &str) -> Vec<(&'a CanonicalAntigen, FullScore)> {
        let query = normalize_query(text);
        self.rank(&query, self.hidb.antigens().iter())
            .into_iter()
            .map(|s| (s.record, s.score.full))
            .collect()
    }

    /// The antigen whose name plus qualifiers is exactly `text`. Only
    /// surrounding whitespace is ignored; case must match.
    ///
    /// # Errors
    ///
    /// Returns `HiDbError::NotFound` listing the candidates that were checked.
    pub fn find_antigens_exact(&self, text: &str) -> Result<&'a CanonicalAntigen, HiDbError> {
        let query = text.trim();
        let candidates = self.find_candidates(query);
        let found = candidates
            .iter()
            .find(|a| a.name_for_exact_matching() == query);
        found.ok_or_else(|| HiDbError::NotFound {
            name: query.to_string(),
            candidates: candidates.iter().map(CanonicalAntigen::full_name).collect(),
        })
    }

    /// Rank the whole index bucket of the query, without field narrowing
    #[must_use]
    pub fn find_antigens_fuzzy(&self, text: &str) -> Vec<&'a CanonicalAntigen> {
        let query = normalize_query(text);
        let key = match name::split(&query) {
            Ok(parts) => match self.locations.resolve(&parts.location) {
                Ok(location) => index_key(&location.name),
                Err(_) => return Vec::new(),
            },
            Err(_) if is_cdc_name(&query) => cdc_index_key(&query, self.locations),
            Err(_) => return Vec::new(),
        };
        let Some(bucket) = self.hidb.index().bucket(&key) else {
            return Vec::new();
        };
        let antigens = self.hidb.antigens();
        self.rank(&query, bucket.iter().map(|&id| (id, &antigens[id])))
            .into_iter()
            .map(|s| s.record)
            .collect()
    }

    /// Rank every antigen in the catalog
    #[must_use]
    pub fn find_antigens_extra_fuzzy(&self, text: &str) -> Vec<&'a CanonicalAntigen> {
        let query = normalize_query(text);
        self.rank(&query, self.hidb.antigens().iter())
            .into_iter()
            .map(|s| s.record)
            .collect()
    }

    /// Antigens carrying a lab id; a bare number is taken as a CDC id
    #[must_use]
    pub fn find_antigens_by_lab_id(&self, lab_id: &str) -> AntigenRefs<'a> {
        let lab_id = if lab_id.starts_with(|c: char| c.is_ascii_digit()) {
            format!("CDC#{lab_id}")
        } else {
            lab_id.to_string()
        };
        let ids = self
            .hidb
            .antigens()
            .iter()
            .filter(|(_, a)| a.has_lab_id(&lab_id))
            .map(|(id, _)| id)
            .collect();
        self.refs(ids)
    }

    /// Best matching sera; sera are not indexed, the whole catalog is scanned
    #[must_use]
    pub fn find_sera(&self, text: &str) -> Vec<&'a CanonicalSerum> {
        self.find_sera_scored(text)
            .into_iter()
            .map(|s| s.record)
            .collect()
    }

    #[must_use]
    pub fn find_sera_scored(&self, text: &str) -> Vec<Scored<'a, CanonicalSerum>> {
        let query = normalize_query(text);
        self.rank(&query, self.hidb.sera().iter())
    }

    /// Best-tier sera with their full scores, in ranking order
    #[must_use]
    pub fn find_sera_with_score(&self, text: &str) -> Vec<(&'a CanonicalSerum, FullScore)> {
        let query = normalize_query(text);
        self.rank(&query, self.hidb.sera().iter())
            .into_iter()
            .map(|s| (s.record, s.score.full))
            .collect()
    }

    /// The serum whose name plus qualifiers is exactly `text`, case included
    ///
    /// # Errors
    ///
    /// Returns `HiDbError::NotFound` if no serum matches.
    pub fn find_sera_exact(&self, text: &str) -> Result<&'a CanonicalSerum, HiDbError> {
        let query = text.trim();
        self.hidb
            .sera()
            .iter()
            .map(|(_, serum)| serum)
            .find(|s| s.name_for_exact_matching() == query)
            .ok_or_else(|| HiDbError::NotFound {
                name: query.to_string(),
                candidates: Vec::new(),
            })
    }

    fn refs(&self, ids: Vec<RecordId>) -> AntigenRefs<'a> {
        AntigenRefs::new(self.hidb, self.locations, ids)
    }
}

/// Scoring and decomposition see queries upper-case with surrounding
/// whitespace removed
fn normalize_query(text: &str) -> String {
    text.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::antigen::{Antigen, Serum};
    use crate::core::chart::{Chart, ChartInfo};
    use crate::core::location::LocDb;

    fn locdb() -> LocDb {
        LocDb::new()
            .with_location("PERTH", "AUSTRALIA", "AUSTRALIA-OCEANIA")
            .with_location("PERUGIA", "ITALY", "EUROPE")
            .with_location("HONG KONG", "CHINA", "CHINA-SOUTH")
            .with_alias("PERTH WA", "PERTH")
            .with_cdc_abbreviation("HK", "HONG KONG")
    }

    fn make_hidb(locdb: &LocDb) -> HiDb {
        let mut hidb = HiDb::new();
        hidb.merge(
            &Chart::new(ChartInfo::default())
                .with_table_id("t1")
                .with_antigens(vec![
                    Antigen::new("A(H3N2)/PERTH/16/2009").with_passage("E3"),
                    Antigen::new("A(H3N2)/PERTH/16/2009").with_passage("MDCK1"),
                    Antigen::new("A(H3N2)/PERTH/16/2009")
                        .with_reassortant("NYMC-X-187")
                        .with_passage("E3"),
                    Antigen::new("A(H3N2)/PERTH/17/2009"),
                    Antigen::new("A(H3N2)/PERUGIA/1/2010"),
                    Antigen::new("A(H3N2)/HONG KONG/4801/2014").with_lab_id("CDC#2014001"),
                    Antigen::new("HK 1/2009"),
                    Antigen::new("HK 12/2010 E2"),
                ])
                .with_sera(vec![
                    Serum::new("A(H3N2)/PERTH/16/2009")
                        .with_serum_id("F27/10")
                        .with_homologous(0),
                    Serum::new("A(H3N2)/PERUGIA/1/2010").with_serum_id("F3/11"),
                ]),
        )
        .unwrap();
        hidb.rebuild_index(locdb);
        hidb
    }

    #[test]
    fn test_stale_index_is_refused() {
        let mut hidb = HiDb::new();
        hidb.merge(&Chart::new(ChartInfo::default()).with_table_id("t1"))
            .unwrap();
        let db = locdb();
        assert!(matches!(
            QueryEngine::new(&hidb, &db),
            Err(HiDbError::StaleIndex)
        ));
    }

    #[test]
    fn test_find_candidates_narrows_by_fields() {
        let db = locdb();
        let hidb = make_hidb(&db);
        let engine = QueryEngine::new(&hidb, &db).unwrap();

        let refs = engine.find_candidates("A(H3N2)/PERTH/16/2009 EGG");
        assert_eq!(refs.len(), 3);
        assert!(refs.iter().all(|a| a.data.name == "A(H3N2)/PERTH/16/2009"));

        // alias resolves to the canonical bucket
        let refs = engine.find_candidates("a(h3n2)/perth wa/16/2009");
        assert_eq!(refs.len(), 3);
    }

    #[test]
    fn test_unknown_location_yields_nothing() {
        let db = locdb();
        let hidb = make_hidb(&db);
        let engine = QueryEngine::new(&hidb, &db).unwrap();
        assert!(engine.find_candidates("A(H3N2)/ATLANTIS/1/2010").is_empty());
        assert!(engine.find_candidates("garbage").is_empty());
        assert!(engine.find_antigens("A(H3N2)/ATLANTIS/1/2010").is_empty());
    }

    #[test]
    fn test_cdc_name_lookup() {
        let db = locdb();
        let hidb = make_hidb(&db);
        let engine = QueryEngine::new(&hidb, &db).unwrap();

        // exact
        let refs = engine.find_candidates("HK 1/2009");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs.get(0).unwrap().data.name, "HK 1/2009");

        // prefix up to the first space after the abbreviation
        let refs = engine.find_candidates("HK 12/2010 E5");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs.get(0).unwrap().data.name, "HK 12/2010 E2");

        // loose suggestion list
        let refs = engine.find_candidates("HK 99/2011");
        assert_eq!(refs.len(), 2);

        // unknown abbreviation, no bucket
        assert!(engine.find_candidates("ZZ 1/2009").is_empty());
    }

    #[test]
    fn test_find_antigens_passage_direct_fallback() {
        let db = locdb();
        let hidb = make_hidb(&db);
        let engine = QueryEngine::new(&hidb, &db).unwrap();

        let found = engine.find_antigens("A(H3N2)/PERTH/16/2009 MDCK");
        assert!(!found.is_empty());
        assert_eq!(found[0].full_name(), "A(H3N2)/PERTH/16/2009 MDCK1");
    }

    #[test]
    fn test_find_antigens_egg_skips_reassortant() {
        let db = locdb();
        let hidb = make_hidb(&db);
        let engine = QueryEngine::new(&hidb, &db).unwrap();

        let scored = engine.find_antigens_scored("A(H3N2)/PERTH/16/2009 EGG");
        assert_eq!(scored[0].record.full_name(), "A(H3N2)/PERTH/16/2009 E3");
        let last = scored.last().unwrap();
        assert_eq!(
            last.record.full_name(),
            "A(H3N2)/PERTH/16/2009 NYMC-X-187 E3"
        );
        assert_eq!(last.score.full, FullScore::Unusable);
    }

    #[test]
    fn test_find_antigens_exact() {
        let db = locdb();
        let hidb = make_hidb(&db);
        let engine = QueryEngine::new(&hidb, &db).unwrap();

        let found = engine
            .find_antigens_exact("A(H3N2)/PERTH/16/2009 MDCK1")
            .unwrap();
        assert_eq!(found.variant_id, "MDCK1");

        match engine.find_antigens_exact("A(H3N2)/PERTH/16/2009 SIAT1") {
            Err(HiDbError::NotFound { candidates, .. }) => assert_eq!(candidates.len(), 3),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_fuzzy_variants_widen_the_search() {
        let db = locdb();
        let hidb = make_hidb(&db);
        let engine = QueryEngine::new(&hidb, &db).unwrap();

        // the isolation differs, so structured narrowing finds nothing
        assert!(engine.find_antigens("A(H3N2)/PERTH/18/2009").is_empty());
        // the whole PERT bucket is searched
        assert!(!engine.find_antigens_fuzzy("A(H3N2)/PERTH/18/2009").is_empty());
        // and the whole catalog
        assert!(!engine
            .find_antigens_extra_fuzzy("A(H3N2)/PERTH/18/2009")
            .is_empty());
    }

    #[test]
    fn test_find_antigens_with_score_keeps_best_tier() {
        let db = locdb();
        let hidb = make_hidb(&db);
        let engine = QueryEngine::new(&hidb, &db).unwrap();

        let found = engine.find_antigens_with_score("A(H3N2)/PERUGIA/1/2010");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0.data.name, "A(H3N2)/PERUGIA/1/2010");
        assert_eq!(found[0].1, FullScore::Matched(22 * 22));

        // PERTH/17 scores below the PERTH/16 tier and is cut
        let found = engine.find_antigens_with_score("A(H3N2)/PERTH/16/2009");
        assert_eq!(found.len(), 3);
        assert!(found
            .iter()
            .all(|(a, score)| a.data.name == "A(H3N2)/PERTH/16/2009"
                && *score != FullScore::Skipped));
        assert_eq!(
            found.len(),
            engine.find_antigens_extra_fuzzy("A(H3N2)/PERTH/16/2009").len()
        );
    }

    #[test]
    fn test_exact_lookup_keeps_case() {
        let db = locdb();
        let mut hidb = HiDb::new();
        let mut antigen = Antigen::new("A(H3N2)/PERTH/16/2009").with_passage("E3");
        antigen.data.annotations.push("Clone 38".to_string());
        hidb.merge(
            &Chart::new(ChartInfo::default())
                .with_table_id("t1")
                .with_antigens(vec![antigen])
                .with_sera(vec![
                    Serum::new("A(H3N2)/PERTH/16/2009").with_serum_id("Ferret 27/10")
                ]),
        )
        .unwrap();
        hidb.rebuild_index(&db);
        let engine = QueryEngine::new(&hidb, &db).unwrap();

        let antigen = &hidb.antigens()[RecordId(0)];
        assert_eq!(antigen.full_name(), "A(H3N2)/PERTH/16/2009 Clone 38 E3");
        let found = engine.find_antigens_exact(&antigen.full_name()).unwrap();
        assert_eq!(found.full_name(), antigen.full_name());
        assert!(matches!(
            engine.find_antigens_exact("A(H3N2)/PERTH/16/2009 CLONE 38 E3"),
            Err(HiDbError::NotFound { .. })
        ));

        let serum = engine
            .find_sera_exact("  A(H3N2)/PERTH/16/2009 Ferret 27/10 ")
            .unwrap();
        assert_eq!(serum.serum_id, "Ferret 27/10");
        assert!(engine
            .find_sera_exact("A(H3N2)/PERTH/16/2009 FERRET 27/10")
            .is_err());
    }

    #[test]
    fn test_zero_name_scores_kept_by_default() {
        let db = locdb();
        let hidb = make_hidb(&db);
        let engine = QueryEngine::new(&hidb, &db).unwrap();
        // nothing in common with any serum name: the whole zero tier is returned
        assert_eq!(engine.find_sera("#").len(), 2);

        let config = QueryConfig {
            drop_zero_name_scores: true,
            ..QueryConfig::default()
        };
        let engine = QueryEngine::with_config(&hidb, &db, config).unwrap();
        assert!(engine.find_sera("#").is_empty());
    }

    #[test]
    fn test_find_by_lab_id() {
        let db = locdb();
        let hidb = make_hidb(&db);
        let engine = QueryEngine::new(&hidb, &db).unwrap();
        assert_eq!(engine.find_antigens_by_lab_id("2014001").len(), 1);
        assert_eq!(engine.find_antigens_by_lab_id("CDC#2014001").len(), 1);
        assert!(engine.find_antigens_by_lab_id("MELB#1").is_empty());
    }

    #[test]
    fn test_find_sera() {
        let db = locdb();
        let hidb = make_hidb(&db);
        let engine = QueryEngine::new(&hidb, &db).unwrap();

        let found = engine.find_sera("A(H3N2)/PERUGIA/1/2010");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].serum_id, "F3/11");

        let exact = engine
            .find_sera_exact("A(H3N2)/PERTH/16/2009 F27/10")
            .unwrap();
        assert_eq!(exact.homologous_for(&crate::core::types::TableId::new("t1")), Some("E3"));
        assert!(matches!(
            engine.find_sera_exact("A(H3N2)/PERTH/16/2009"),
            Err(HiDbError::NotFound { .. })
        ));
        let scored = engine.find_sera_with_score("A(H3N2)/PERTH/16/2009");
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].0.serum_id, "F27/10");
    }

    #[test]
    fn test_candidate_limit() {
        let db = locdb();
        let hidb = make_hidb(&db);
        let config = QueryConfig {
            candidate_limit: Some(1),
            ..QueryConfig::default()
        };
        let engine = QueryEngine::with_config(&hidb, &db, config).unwrap();
        assert_eq!(engine.find_antigens("A(H3N2)/PERTH/16/2009").len(), 1);
    }
}
