//! Two-stage scoring of catalog entries against a free-text query.
//!
//! The *name score* compares the query with the bare name. Entries whose name
//! score reaches the threshold also get a *full score* against the name plus
//! qualifiers. Queries naming a passage or reassortant by a generic keyword
//! (`EGG`, `CELL`, `REASSORTANT`) have the keyword replaced by each concrete
//! spelling found in the entry's qualifiers before scoring; entries that can
//! not satisfy the keyword are marked unusable and always rank last.

use std::cmp::Ordering;

use crate::catalog::arena::CatalogKey;
use crate::core::antigen::join_full_name;
use crate::core::types::{RecordId, Score};
use crate::matching::string_match::match_score;

/// Second-stage score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullScore {
    /// Name score was below the threshold
    Skipped,
    /// The query names a keyword the entry cannot satisfy
    Unusable,
    Matched(Score),
}

impl FullScore {
    /// Numeric value for ordering and reporting; `Skipped` and `Unusable` are `0`
    #[must_use]
    pub fn value(self) -> Score {
        match self {
            Self::Matched(score) => score,
            Self::Skipped | Self::Unusable => 0,
        }
    }
}

/// Keyword of one passage/reassortant family, its concrete spellings, and
/// qualifiers that rule an entry out for it
struct KeywordFamily {
    keyword: &'static str,
    substitutes: &'static [&'static str],
    negatives: &'static [&'static str],
}

const KEYWORD_FAMILIES: [KeywordFamily; 3] = [
    KeywordFamily {
        keyword: " EGG",
        substitutes: &[" E"],
        negatives: &["NYMC", "IVR", "NIB", "RESVIR", "RG", "VI", "REASSORTANT"],
    },
    KeywordFamily {
        keyword: " CELL",
        substitutes: &[" MDCK", " SIAT"],
        negatives: &[],
    },
    KeywordFamily {
        keyword: " REASSORTANT",
        substitutes: &[" NYMC", " IVR", " NIB", " RESVIR", " RG", " VI", " REASSORTANT"],
        negatives: &[],
    },
];

/// Per-family result; derives the order used to combine families
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum FamilyScore {
    /// Keyword not in the query
    Absent,
    Unusable,
    Matched(Score),
}

/// Adaptive default threshold: 5% of a perfect name match (`len²`)
#[must_use]
pub fn default_threshold(query: &str) -> Score {
    let len = query.chars().count() as Score;
    len * len / 20
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindScore {
    pub name: Score,
    pub full: FullScore,
}

impl FindScore {
    /// Score one entry. A `name_score_threshold` of `0` selects
    /// [`default_threshold`].
    #[must_use]
    pub fn calculate(query: &str, name: &str, full_name: &str, name_score_threshold: Score) -> Self {
        let name_score = match_score(name, query);
        let threshold = if name_score_threshold == 0 {
            default_threshold(query)
        } else {
            name_score_threshold
        };
        if name_score < threshold {
            return Self {
                name: name_score,
                full: FullScore::Skipped,
            };
        }

        let query_upper = query.to_uppercase();
        let full_upper = full_name.to_uppercase();
        // qualifiers part of the full name
        let qualifiers = full_upper.get(name.len()..).unwrap_or("");

        let best = KEYWORD_FAMILIES
            .iter()
            .map(|family| substitution_score(family, &query_upper, full_name, qualifiers))
            .max()
            .unwrap_or(FamilyScore::Absent);

        let full = match best {
            FamilyScore::Absent => FullScore::Matched(match_score(full_name, query)),
            FamilyScore::Unusable => FullScore::Unusable,
            FamilyScore::Matched(score) => FullScore::Matched(score),
        };
        Self {
            name: name_score,
            full,
        }
    }

    #[must_use]
    pub fn is_unusable(&self) -> bool {
        self.full == FullScore::Unusable
    }

    /// Ranking order: unusable entries last, then name score descending,
    /// then full score descending
    #[must_use]
    pub fn ranking_cmp(&self, other: &Self) -> Ordering {
        match (self.is_unusable(), other.is_unusable()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => other
                .name
                .cmp(&self.name)
                .then_with(|| other.full.value().cmp(&self.full.value())),
        }
    }
}

fn substitution_score(
    family: &KeywordFamily,
    query: &str,
    full_name: &str,
    qualifiers: &str,
) -> FamilyScore {
    let Some(pos) = query.find(family.keyword) else {
        return FamilyScore::Absent;
    };
    if family.negatives.iter().any(|neg| qualifiers.contains(neg)) {
        return FamilyScore::Unusable;
    }
    family
        .substitutes
        .iter()
        // present in the qualifiers, leading space dropped
        .filter(|subst| qualifiers.contains(&subst[1..]))
        .map(|subst| match_score(full_name, &format!("{}{subst}", &query[..pos])))
        .max()
        .map_or(FamilyScore::Unusable, FamilyScore::Matched)
}

/// A catalog entry with its score
#[derive(Debug, Clone, Copy)]
pub struct Scored<'a, T> {
    pub id: RecordId,
    pub record: &'a T,
    pub score: FindScore,
}

/// Score entries in the given (catalog) order and sort them for ranking.
///
/// The name-score threshold starts at `0` (the adaptive default) and is raised
/// to the best name score seen so far after each entry, so the threshold an
/// entry is judged by depends on what was scanned before it.
pub fn score_candidates<'a, T: CatalogKey + 'a>(
    query: &str,
    candidates: impl IntoIterator<Item = (RecordId, &'a T)>,
) -> Vec<Scored<'a, T>> {
    let mut threshold: Score = 0;
    let mut scored: Vec<Scored<'a, T>> = candidates
        .into_iter()
        .map(|(id, record)| {
            let full_name = join_full_name(record.name(), record.variant_id());
            let score = FindScore::calculate(query, record.name(), &full_name, threshold);
            threshold = threshold.max(score.name);
            Scored { id, record, score }
        })
        .collect();
    scored.sort_by(|a, b| a.score.ranking_cmp(&b.score));
    scored
}

/// Keep the leading run of entries sharing the first entry's name score
#[must_use]
pub fn keep_best<T>(mut scored: Vec<Scored<'_, T>>) -> Vec<Scored<'_, T>> {
    if let Some(best) = scored.first().map(|s| s.score.name) {
        let end = scored
            .iter()
            .position(|s| s.score.name != best)
            .unwrap_or(scored.len());
        scored.truncate(end);
    }
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERTH: &str = "A(H3N2)/PERTH/16/2009";

    #[test]
    fn test_default_threshold() {
        assert_eq!(default_threshold("A(H3N2)/PERTH/16/2009 MDCK"), 26 * 26 / 20);
        assert_eq!(default_threshold("AB"), 0);
    }

    #[test]
    fn test_below_threshold_is_not_full_scored() {
        let score = FindScore::calculate("B/BRISBANE/60/2008", PERTH, PERTH, 0);
        assert_eq!(score.full, FullScore::Skipped);
    }

    #[test]
    fn test_no_keyword_falls_back_to_direct_match() {
        let full = format!("{PERTH} MDCK1");
        let score = FindScore::calculate("A(H3N2)/PERTH/16/2009 MDCK", PERTH, &full, 0);
        assert_eq!(score.name, 441);
        assert_eq!(score.full, FullScore::Matched(26 * 26));
    }

    #[test]
    fn test_cell_keyword_substituted() {
        let full = format!("{PERTH} MDCK1");
        let score = FindScore::calculate("A(H3N2)/PERTH/16/2009 CELL", PERTH, &full, 0);
        // query rewritten to "A(H3N2)/PERTH/16/2009 MDCK"
        assert_eq!(score.full, FullScore::Matched(26 * 26));

        let siat = format!("{PERTH} SIAT2");
        let score = FindScore::calculate("A(H3N2)/PERTH/16/2009 CELL", PERTH, &siat, 0);
        assert_eq!(score.full, FullScore::Matched(26 * 26));
    }

    #[test]
    fn test_unresolvable_keyword_is_unusable() {
        let full = format!("{PERTH} E3");
        let score = FindScore::calculate("A(H3N2)/PERTH/16/2009 CELL", PERTH, &full, 0);
        assert_eq!(score.full, FullScore::Unusable);
    }

    #[test]
    fn test_egg_negative_marker_is_unusable() {
        let full = format!("{PERTH} NYMC-X-187 E3");
        let score = FindScore::calculate("A(H3N2)/PERTH/16/2009 EGG", PERTH, &full, 0);
        assert_eq!(score.full, FullScore::Unusable);

        let full = format!("{PERTH} E3");
        let score = FindScore::calculate("A(H3N2)/PERTH/16/2009 EGG", PERTH, &full, 0);
        assert_eq!(score.full, FullScore::Matched(23 * 23));
    }

    #[test]
    fn test_keyword_only_searched_in_qualifiers() {
        // "E" occurs in PERTH but not in the (empty) qualifiers
        let score = FindScore::calculate("A(H3N2)/PERTH/16/2009 EGG", PERTH, PERTH, 0);
        assert_eq!(score.full, FullScore::Unusable);
    }

    #[test]
    fn test_ranking_cmp_puts_unusable_last() {
        let unusable = FindScore {
            name: 1000,
            full: FullScore::Unusable,
        };
        let weak = FindScore {
            name: 10,
            full: FullScore::Skipped,
        };
        let strong = FindScore {
            name: 10,
            full: FullScore::Matched(50),
        };
        let mut scores = vec![unusable, weak, strong];
        scores.sort_by(FindScore::ranking_cmp);
        assert_eq!(scores, vec![strong, weak, unusable]);
    }

    struct Entry(&'static str, &'static str);

    impl CatalogKey for Entry {
        fn name(&self) -> &str {
            self.0
        }
        fn variant_id(&self) -> &str {
            self.1
        }
    }

    #[test]
    fn test_running_threshold_depends_on_scan_order() {
        let exact = Entry(PERTH, "");
        let near = Entry("A(H3N2)/PERTH/16/2008", "");
        let query = PERTH;

        // exact first: the near miss is judged against the exact name score
        let scored = score_candidates(query, vec![(RecordId(0), &exact), (RecordId(1), &near)]);
        let near_score = scored.iter().find(|s| s.id == RecordId(1)).unwrap().score;
        assert_eq!(near_score.full, FullScore::Skipped);

        // near miss first: it passes the adaptive default and is full-scored
        let scored = score_candidates(query, vec![(RecordId(1), &near), (RecordId(0), &exact)]);
        let near_score = scored.iter().find(|s| s.id == RecordId(1)).unwrap().score;
        assert!(matches!(near_score.full, FullScore::Matched(_)));
    }

    #[test]
    fn test_keep_best_keeps_name_score_ties() {
        let a = Entry(PERTH, "E3");
        let b = Entry(PERTH, "MDCK1");
        let c = Entry("A(H3N2)/PERUGIA/1/2010", "");
        let scored = score_candidates(
            PERTH,
            vec![(RecordId(0), &a), (RecordId(1), &b), (RecordId(2), &c)],
        );
        assert_eq!(scored.len(), 3);
        let best = keep_best(scored);
        assert_eq!(best.len(), 2);
        assert!(best.iter().all(|s| s.score.name == 441));
    }
}
