//! # hidb
//!
//! A catalog of influenza antigens and sera merged from many
//! hemagglutination-inhibition (HI) tables, with approximate name lookup.
//!
//! The same antigen shows up in many tables, often under slightly different
//! spellings and with different passage histories. `hidb` merges every table
//! of one virus type into a single deduplicated catalog and answers
//! "which catalog entries does this name refer to?".
//!
//! ## Features
//!
//! - **Merging**: one canonical record per name and variant, remembering the
//!   tables (and dates) it appeared in
//! - **Indexed lookup**: candidates narrowed by location, host, isolation and year
//! - **Approximate matching**: tolerant of typos and missing qualifiers
//! - **Passage keywords**: `EGG`, `CELL` and `REASSORTANT` match the concrete
//!   passage or reassortant recorded for each entry
//! - **Statistics**: antigen counts by virus type, lab, month and continent
//!
//! ## Example
//!
//! ```rust,no_run
//! use hidb::{Antigen, Chart, ChartInfo, HiDb, QueryEngine};
//! use hidb::core::location::LocDb;
//!
//! let locdb = LocDb::new().with_location("PERTH", "AUSTRALIA", "AUSTRALIA-OCEANIA");
//!
//! let mut hidb = HiDb::new();
//! let chart = Chart::new(ChartInfo::default())
//!     .with_table_id("A(H3N2):HI:CDC:20100101")
//!     .with_antigens(vec![Antigen::new("A(H3N2)/PERTH/16/2009").with_passage("E3")]);
//! hidb.merge(&chart).unwrap();
//! hidb.rebuild_index(&locdb);
//!
//! let engine = QueryEngine::new(&hidb, &locdb).unwrap();
//! for antigen in engine.find_antigens("A(H3N2)/PERTH/16/2009 EGG") {
//!     println!("{}", antigen.full_name());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`catalog`]: catalog storage, merging, snapshots and indexing
//! - [`core`]: virus names, antigens, sera, charts and locations
//! - [`matching`]: query engine and scoring
//! - [`parsing`]: chart and location database readers
//! - [`cli`]: command-line interface implementation

pub mod catalog;
pub mod cli;
pub mod core;
pub mod matching;
pub mod parsing;

// Re-export commonly used types for convenience
pub use catalog::set::CatalogSet;
pub use catalog::store::{CanonicalAntigen, CanonicalSerum, HiDb, HiDbError};
pub use crate::core::antigen::{Antigen, Serum};
pub use crate::core::chart::{Chart, ChartInfo};
pub use crate::core::types::*;
pub use matching::engine::{QueryConfig, QueryEngine};
pub use matching::refs::AntigenRefs;
