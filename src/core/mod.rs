//! Core data types for HI table catalogs.
//!
//! - [`name`]: decomposition of virus names (`A(H3N2)/PERTH/16/2009`)
//! - [`antigen`]: antigens and sera as they appear in one chart
//! - [`chart`]: imported charts and what the catalog keeps of them
//! - [`location`]: location lookup used for indexing and statistics
//! - [`types`]: identifiers and small shared types
//!
//! ## Virus names
//!
//! | Form       | Example                              |
//! |------------|--------------------------------------|
//! | Human      | A(H3N2)/PERTH/16/2009                |
//! | With host  | A(H1N1)/SWINE/IOWA/15/1930           |
//! | CDC        | HK 1/2009                            |
//!
//! Names that do not decompose are still stored and can be found by a whole
//! catalog search, but are left out of the location index.

pub mod antigen;
pub mod chart;
pub mod location;
pub mod name;
pub mod types;
