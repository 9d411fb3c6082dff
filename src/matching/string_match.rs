//! Approximate matching of virus names.
//!
//! Both strings are upper-cased and whitespace runs collapsed. The query is
//! then consumed left to right: at each step the longest prefix of the rest
//! of the query that occurs in the candidate (at or after the end of the
//! previous matched chunk) is taken and scores the square of its length.
//! Query characters that occur nowhere are skipped. Long contiguous runs
//! therefore dominate: a full match of an `n`-character query scores `n²`,
//! while the same characters matched in scattered fragments score far less.

use crate::core::types::Score;

/// Similarity of `query` to `candidate`; `0` means no overlap at all.
///
/// Not commutative: the query drives the scan, the candidate is searched.
#[must_use]
pub fn match_score(candidate: &str, query: &str) -> Score {
    let candidate = normalize(candidate);
    let query = normalize(query);

    let mut score: Score = 0;
    let (mut q, mut c) = (0usize, 0usize);
    while q < query.len() {
        match longest_prefix_match(&query[q..], &candidate[c..]) {
            Some((at, len)) => {
                score += (len * len) as Score;
                c += at + len;
                q += len;
            }
            None => q += 1,
        }
    }
    score
}

fn normalize(s: &str) -> Vec<char> {
    let mut out = Vec::with_capacity(s.len());
    for word in s.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.extend(word.chars().flat_map(char::to_uppercase));
    }
    out
}

/// Earliest position in `haystack` holding the longest prefix of `needle`,
/// as `(position, length)`
fn longest_prefix_match(needle: &[char], haystack: &[char]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    for start in 0..haystack.len() {
        let len = needle
            .iter()
            .zip(&haystack[start..])
            .take_while(|(a, b)| a == b)
            .count();
        if len > best.map_or(0, |(_, l)| l) {
            best = Some((start, len));
            if len == needle.len() {
                break;
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_scores_length_squared() {
        let name = "A(H3N2)/PERTH/16/2009";
        assert_eq!(match_score(name, name), 21 * 21);
    }

    #[test]
    fn test_case_and_whitespace_insensitive() {
        assert_eq!(
            match_score("A(H3N2)/PERTH/16/2009 MDCK1", "a(h3n2)/perth/16/2009   mdck"),
            match_score("A(H3N2)/PERTH/16/2009 MDCK1", "A(H3N2)/PERTH/16/2009 MDCK")
        );
    }

    #[test]
    fn test_no_overlap_is_zero() {
        assert_eq!(match_score("XYZ", "ABC"), 0);
        assert_eq!(match_score("", "ABC"), 0);
        assert_eq!(match_score("ABC", ""), 0);
    }

    #[test]
    fn test_query_suffix_missing_from_candidate() {
        // name part matches fully, " MDCK" has nothing left to match against
        assert_eq!(
            match_score("A(H3N2)/PERTH/16/2009", "A(H3N2)/PERTH/16/2009 MDCK"),
            441
        );
        assert_eq!(
            match_score("A(H3N2)/PERTH/16/2009 MDCK1", "A(H3N2)/PERTH/16/2009 MDCK"),
            26 * 26
        );
    }

    #[test]
    fn test_contiguous_beats_scattered() {
        let query = "PERTH/16/2009";
        let exact = match_score("A(H3N2)/PERTH/16/2009", query);
        let other = match_score("A(H3N2)/PERUGIA/16/2010", query);
        assert_eq!(exact, 13 * 13);
        assert!(other < exact);
        assert!(other > 0);
    }

    #[test]
    fn test_not_commutative() {
        assert_eq!(match_score("AB", "ABAB"), 4);
        assert_eq!(match_score("ABAB", "AB"), 4);
        assert_eq!(match_score("ABXAB", "ABAB"), 8);
        assert_eq!(match_score("ABAB", "ABXAB"), 8);
        assert_eq!(match_score("ABC", "CAB"), 1);
        assert_eq!(match_score("CAB", "ABC"), 4);
    }
}
