//! Name lookup: candidate search, scoring and ranking.
//!
//! - [`QueryEngine`]: entry point for antigen and serum queries
//! - [`AntigenRefs`]: candidate lists with country and date filters
//! - [`FindScore`]: two-stage score of one catalog entry
//!
//! ## Algorithm
//!
//! 1. **Candidates**: the query name is decomposed and its location resolved;
//!    the index bucket for that location is narrowed to entries with the same
//!    host, isolation and year. CDC-style names use abbreviation lookup.
//! 2. **Name score**: approximate match of the query against the bare name.
//! 3. **Full score**: entries whose name score reaches a running threshold
//!    are scored against name plus qualifiers, with `EGG`, `CELL` and
//!    `REASSORTANT` replaced by the concrete spellings they stand for.
//! 4. **Ranking**: name score, then full score; entries that cannot satisfy
//!    a keyword go last. Only the best name-score tier is returned.

pub mod engine;
pub mod refs;
pub mod scoring;
pub mod stat;
pub mod string_match;

pub use engine::{QueryConfig, QueryEngine};
pub use refs::AntigenRefs;
pub use scoring::{FindScore, FullScore};
