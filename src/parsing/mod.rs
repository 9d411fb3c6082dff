//! Readers for the files hidb imports.
//!
//! - [`chart`]: chart JSON, one assay table per file
//! - [`locdb`]: location database JSON
//!
//! Both accept gzip-compressed input when the file name ends in `.gz`.

pub mod chart;
pub mod locdb;
