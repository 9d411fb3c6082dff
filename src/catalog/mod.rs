//! Catalog storage and indexing.
//!
//! A [`HiDb`](store::HiDb) holds one canonical record per distinct
//! `(name, variant_id)` across all merged charts, plus a descriptor of every
//! chart. Records are kept in a [`SortedArena`](arena::SortedArena): ids are
//! stable and the sorted order is maintained on insert.
//!
//! ## Lifecycle
//!
//! ```rust,no_run
//! use hidb::{HiDb, QueryEngine};
//! use hidb::core::location::LocDb;
//! use hidb::parsing::chart::parse_chart_file;
//! use std::path::Path;
//!
//! let locdb = LocDb::new();
//! let mut hidb = HiDb::new();
//!
//! // Import phase
//! let chart = parse_chart_file(Path::new("table.json.gz")).unwrap();
//! hidb.merge(&chart).unwrap();
//!
//! // Index, then query
//! hidb.rebuild_index(&locdb);
//! let engine = QueryEngine::new(&hidb, &locdb).unwrap();
//! let found = engine.find_antigens("A(H3N2)/PERTH/16/2009 EGG");
//! ```
//!
//! [`CatalogSet`](set::CatalogSet) opens one catalog per virus type from a
//! directory of snapshots.

pub mod arena;
pub mod index;
pub mod set;
pub mod store;
