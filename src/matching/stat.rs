//! Aggregate views over a catalog: antigen counts, countries and locations
//! the location database does not know.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::store::CanonicalAntigen;
use crate::core::types::TableId;
use crate::matching::engine::QueryEngine;

/// Continent used for locations the location database does not know
pub const UNKNOWN_CONTINENT: &str = "UNKNOWN";

/// Country reported for locations the location database does not know
pub const UNKNOWN_COUNTRY: &str = "**UNKNOWN";

/// Distinct antigen names counted by virus type, lab, `YYYYMM` and continent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AntigenStat {
    pub counts: BTreeMap<String, BTreeMap<String, BTreeMap<String, BTreeMap<String, usize>>>>,
    pub total: usize,
}

impl AntigenStat {
    fn add(&mut self, virus_type: &str, lab: &str, year_month: &str, continent: &str) {
        *self
            .counts
            .entry(virus_type.to_string())
            .or_default()
            .entry(lab.to_string())
            .or_default()
            .entry(year_month.to_string())
            .or_default()
            .entry(continent.to_string())
            .or_default() += 1;
        self.total += 1;
    }

    /// Count for one cell, `0` when absent
    #[must_use]
    pub fn get(&self, virus_type: &str, lab: &str, year_month: &str, continent: &str) -> usize {
        self.counts
            .get(virus_type)
            .and_then(|labs| labs.get(lab))
            .and_then(|months| months.get(year_month))
            .and_then(|continents| continents.get(continent))
            .copied()
            .unwrap_or(0)
    }

    /// Flattened `(virus_type, lab, year_month, continent, count)` rows in key order
    pub fn rows(&self) -> impl Iterator<Item = (&str, &str, &str, &str, usize)> + '_ {
        self.counts.iter().flat_map(|(virus_type, labs)| {
            labs.iter().flat_map(move |(lab, months)| {
                months.iter().flat_map(move |(year_month, continents)| {
                    continents.iter().map(move |(continent, &count)| {
                        (
                            virus_type.as_str(),
                            lab.as_str(),
                            year_month.as_str(),
                            continent.as_str(),
                            count,
                        )
                    })
                })
            })
        })
    }
}

/// `2009-06-12` -> `200906`, `2009` -> `2009`
fn year_month(date: &str) -> String {
    match (date.get(0..4), date.get(5..7)) {
        (Some(year), Some(month)) => format!("{year}{month}"),
        (Some(year), None) => year.to_string(),
        _ => date.to_string(),
    }
}

impl QueryEngine<'_> {
    /// Count each distinct antigen name once, attributed to the earliest
    /// table any of its variants appeared in.
    ///
    /// Undated antigens are filed under the year of their name (`????` when
    /// the name does not decompose); unknown locations under
    /// [`UNKNOWN_CONTINENT`].
    #[must_use]
    pub fn stat(&self) -> AntigenStat {
        let hidb = self.hidb();
        let locations = self.locations();
        let mut stat = AntigenStat::default();

        let mut group: Vec<&CanonicalAntigen> = Vec::new();
        let mut flush = |group: &mut Vec<&CanonicalAntigen>| {
            let Some(first) = group.first() else {
                return;
            };
            let earliest: Option<&TableId> = group
                .iter()
                .filter_map(|a| a.per_table.first().map(|e| &e.table_id))
                .min();
            let Some(info) = earliest.and_then(|id| hidb.chart(id)).map(|c| &c.info) else {
                group.clear();
                return;
            };

            let date = group
                .iter()
                .map(|a| a.date())
                .find(|d| !d.is_empty())
                .map(year_month)
                .unwrap_or_else(|| {
                    let year = first.data.year();
                    if year.is_empty() {
                        "????".to_string()
                    } else {
                        year
                    }
                });
            let continent = locations.continent_or(&first.data.location(), UNKNOWN_CONTINENT);
            stat.add(&info.virus_type, &info.lab, &date, &continent);
            group.clear();
        };

        for (_, antigen) in hidb.antigens().iter() {
            if group.first().is_some_and(|a| a.data.name != antigen.data.name) {
                flush(&mut group);
            }
            group.push(antigen);
        }
        flush(&mut group);
        stat
    }

    /// Countries of all antigen locations, sorted and deduplicated.
    /// Unknown locations show up as [`UNKNOWN_COUNTRY`].
    #[must_use]
    pub fn all_countries(&self) -> Vec<String> {
        let locations = self.locations();
        let names: BTreeSet<String> = self
            .hidb()
            .antigens()
            .iter()
            .map(|(_, a)| a.data.location())
            .filter(|location| !location.is_empty())
            .collect();
        let countries: BTreeSet<String> = names
            .iter()
            .map(|name| {
                locations
                    .country(name)
                    .unwrap_or_else(|_| UNKNOWN_COUNTRY.to_string())
            })
            .collect();
        countries.into_iter().collect()
    }

    /// Location fields of antigen and serum names that the location
    /// database does not know, sorted and deduplicated
    #[must_use]
    pub fn unrecognized_locations(&self) -> Vec<String> {
        let locations = self.locations();
        let hidb = self.hidb();
        let antigen_locations = hidb.antigens().iter().map(|(_, a)| a.data.location());
        let serum_locations = hidb.sera().iter().map(|(_, s)| s.data.location());
        let unknown: BTreeSet<String> = antigen_locations
            .chain(serum_locations)
            .filter(|location| !location.is_empty() && !locations.find(location))
            .collect();
        unknown.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::store::HiDb;
    use crate::core::antigen::{Antigen, Serum};
    use crate::core::chart::{Chart, ChartInfo};
    use crate::core::location::LocDb;

    fn locdb() -> LocDb {
        LocDb::new()
            .with_location("PERTH", "AUSTRALIA", "AUSTRALIA-OCEANIA")
            .with_location("PERUGIA", "ITALY", "EUROPE")
    }

    fn info(lab: &str, date: &str) -> ChartInfo {
        ChartInfo {
            virus_type: "A(H3N2)".to_string(),
            lab: lab.to_string(),
            assay: "HI".to_string(),
            date: date.to_string(),
        }
    }

    fn make_hidb(locdb: &LocDb) -> HiDb {
        let mut hidb = HiDb::new();
        hidb.merge(&Chart::new(info("CDC", "2010-01-01")).with_antigens(vec![
            Antigen::new("A(H3N2)/PERTH/16/2009")
                .with_passage("E3")
                .with_date("2009-06-12"),
            Antigen::new("A(H3N2)/PERUGIA/1/2010"),
            Antigen::new("A(H3N2)/ATLANTIS/5/2011"),
        ]))
        .unwrap();
        hidb.merge(
            &Chart::new(info("MELB", "2011-03-01"))
                .with_antigens(vec![Antigen::new("A(H3N2)/PERTH/16/2009").with_passage("MDCK1")])
                .with_sera(vec![Serum::new("A(H3N2)/LEMURIA/2/2008")]),
        )
        .unwrap();
        hidb.rebuild_index(locdb);
        hidb
    }

    #[test]
    fn test_stat_counts_each_name_once() {
        let db = locdb();
        let hidb = make_hidb(&db);
        let engine = QueryEngine::new(&hidb, &db).unwrap();
        let stat = engine.stat();

        assert_eq!(stat.total, 3);
        // both PERTH variants count once, under the earlier CDC table
        assert_eq!(stat.get("A(H3N2)", "CDC", "200906", "AUSTRALIA-OCEANIA"), 1);
        assert_eq!(stat.get("A(H3N2)", "MELB", "200906", "AUSTRALIA-OCEANIA"), 0);
        // undated: year of the name
        assert_eq!(stat.get("A(H3N2)", "CDC", "2010", "EUROPE"), 1);
        assert_eq!(stat.get("A(H3N2)", "CDC", "2011", UNKNOWN_CONTINENT), 1);
        assert_eq!(stat.rows().count(), 3);
    }

    #[test]
    fn test_all_countries() {
        let db = locdb();
        let hidb = make_hidb(&db);
        let engine = QueryEngine::new(&hidb, &db).unwrap();
        assert_eq!(
            engine.all_countries(),
            vec!["**UNKNOWN", "AUSTRALIA", "ITALY"]
        );
    }

    #[test]
    fn test_unrecognized_locations_include_sera() {
        let db = locdb();
        let hidb = make_hidb(&db);
        let engine = QueryEngine::new(&hidb, &db).unwrap();
        assert_eq!(engine.unrecognized_locations(), vec!["ATLANTIS", "LEMURIA"]);
    }

    #[test]
    fn test_year_month() {
        assert_eq!(year_month("2009-06-12"), "200906");
        assert_eq!(year_month("2009-06"), "200906");
        assert_eq!(year_month("2009"), "2009");
    }
}
