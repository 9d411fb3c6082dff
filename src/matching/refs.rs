use crate::catalog::store::{CanonicalAntigen, HiDb};
use crate::core::location::LocationService;
use crate::core::types::RecordId;

/// A list of catalog antigens, narrowed by chained filters.
///
/// ```rust,no_run
/// # use hidb::{HiDb, QueryEngine};
/// # use hidb::core::location::LocDb;
/// # let hidb = HiDb::new();
/// # let locdb = LocDb::new();
/// let engine = QueryEngine::new(&hidb, &locdb).unwrap();
/// let refs = engine
///     .find_candidates("A(H3N2)/PERTH/16/2009")
///     .filter_by_country("AUSTRALIA")
///     .filter_by_date_range("2009-01", "");
/// for antigen in refs.iter() {
///     println!("{}", antigen.full_name());
/// }
/// ```
#[derive(Clone)]
pub struct AntigenRefs<'a> {
    hidb: &'a HiDb,
    locations: &'a dyn LocationService,
    ids: Vec<RecordId>,
}

impl<'a> AntigenRefs<'a> {
    pub(crate) fn new(
        hidb: &'a HiDb,
        locations: &'a dyn LocationService,
        ids: Vec<RecordId>,
    ) -> Self {
        Self {
            hidb,
            locations,
            ids,
        }
    }

    /// Keep antigens whose name location resolves to `country`.
    /// Unknown locations never match.
    #[must_use]
    pub fn filter_by_country(mut self, country: &str) -> Self {
        let (hidb, locations) = (self.hidb, self.locations);
        self.ids
            .retain(|&id| in_country(&hidb.antigens()[id], locations, country));
        self
    }

    /// Keep antigens dated in `[begin, end)`. An empty bound is not applied;
    /// undated antigens are dropped as soon as either bound is given.
    #[must_use]
    pub fn filter_by_date_range(mut self, begin: &str, end: &str) -> Self {
        if begin.is_empty() && end.is_empty() {
            return self;
        }
        let hidb = self.hidb;
        self.ids
            .retain(|&id| in_date_range(&hidb.antigens()[id], begin, end));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a CanonicalAntigen> + '_ {
        let hidb = self.hidb;
        self.ids.iter().map(move |&id| &hidb.antigens()[id])
    }

    #[must_use]
    pub fn get(&self, i: usize) -> Option<&'a CanonicalAntigen> {
        self.ids.get(i).map(|&id| &self.hidb.antigens()[id])
    }

    #[must_use]
    pub fn ids(&self) -> &[RecordId] {
        &self.ids
    }

    /// `(id, record)` pairs, in list order
    pub fn entries(&self) -> impl Iterator<Item = (RecordId, &'a CanonicalAntigen)> + '_ {
        let hidb = self.hidb;
        self.ids.iter().map(move |&id| (id, &hidb.antigens()[id]))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

pub(crate) fn in_country(
    antigen: &CanonicalAntigen,
    locations: &dyn LocationService,
    country: &str,
) -> bool {
    locations
        .country(&antigen.data.location())
        .is_ok_and(|c| c == country)
}

/// `[begin, end)` with empty bounds left open; undated antigens never match
pub(crate) fn in_date_range(antigen: &CanonicalAntigen, begin: &str, end: &str) -> bool {
    let date = antigen.date();
    !date.is_empty() && (begin.is_empty() || date >= begin) && (end.is_empty() || date < end)
}

impl std::fmt::Debug for AntigenRefs<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.iter().map(CanonicalAntigen::full_name))
            .finish()
    }
}
