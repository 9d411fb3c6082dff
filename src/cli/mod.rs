//! Command-line interface for hidb.
//!
//! Available commands:
//!
//! - **import**: Merge chart files into a catalog snapshot
//! - **find**: Look up antigens or sera by (possibly approximate) name
//! - **list**: List distinct antigen or serum names
//! - **stat**: Antigen counts by virus type, lab, month and continent
//! - **countries**: Countries of all antigen locations
//! - **unrecognized**: Locations missing from the location database
//!
//! ## Usage
//!
//! ```text
//! # Build the H3 catalog from charts
//! hidb import --hidb-dir db -t h3 charts/*.json.gz
//!
//! # Find an antigen, allowing a generic passage keyword
//! hidb find --hidb-dir db -t h3 "A(H3N2)/PERTH/16/2009 EGG"
//!
//! # JSON output for scripting
//! hidb --format json stat --hidb-dir db -t h3
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::warn;

use crate::catalog::set::CatalogSet;
use crate::core::location::LocDb;
use crate::core::types::VirusType;
use crate::parsing::locdb::parse_locdb_file;

pub mod find;
pub mod import;
pub mod report;

#[derive(Parser)]
#[command(name = "hidb")]
#[command(author = "Fulcrum Genomics")]
#[command(version)]
#[command(about = "Merge HI assay tables into a searchable antigen/serum catalog")]
#[command(
    long_about = "hidb merges antigens and sera from many hemagglutination-inhibition tables into one deduplicated catalog per virus type.\n\nThe catalog can then be searched by virus name, tolerating misspellings, missing qualifiers and generic passage keywords (EGG, CELL, REASSORTANT)."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge chart files into a catalog snapshot
    Import(import::ImportArgs),

    /// Find antigens or sera by name
    Find(find::FindArgs),

    /// List distinct antigen or serum names
    List(report::ListArgs),

    /// Antigen counts by virus type, lab, month and continent
    Stat(CatalogArgs),

    /// Countries of all antigen locations
    Countries(CatalogArgs),

    /// Antigen and serum locations not in the location database
    Unrecognized(CatalogArgs),
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}

/// Where catalogs and the location database live
#[derive(Args, Clone, Debug)]
pub struct CatalogArgs {
    /// Directory holding hidb.<h1|h3|b>.json[.gz] snapshots
    #[arg(long, default_value = ".")]
    pub hidb_dir: PathBuf,

    /// Virus type: A(H1N1), A(H3N2), B (or h1, h3, b)
    #[arg(short = 't', long, default_value = "A(H3N2)")]
    pub virus_type: String,

    /// Location database (defaults to locationdb.json[.gz] in the catalog directory)
    #[arg(long)]
    pub locdb: Option<PathBuf>,
}

impl CatalogArgs {
    /// # Errors
    ///
    /// Returns an error if the virus type is not supported.
    pub fn virus_type(&self) -> anyhow::Result<VirusType> {
        VirusType::parse(&self.virus_type)
            .ok_or_else(|| anyhow::anyhow!("Unsupported virus type: {}", self.virus_type))
    }

    /// Load the location database. A missing default database is not an
    /// error: every location is then unrecognized.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly given or existing database can't be parsed.
    pub fn load_locations(&self) -> anyhow::Result<LocDb> {
        if let Some(path) = &self.locdb {
            return parse_locdb_file(path)
                .with_context(|| format!("Failed to load location database {}", path.display()));
        }
        let found = ["locationdb.json.gz", "locationdb.json"]
            .iter()
            .map(|name| self.hidb_dir.join(name))
            .find(|path| path.exists());
        match found {
            Some(path) => parse_locdb_file(&path)
                .with_context(|| format!("Failed to load location database {}", path.display())),
            None => {
                warn!(
                    "No location database in {}, all locations are unrecognized",
                    self.hidb_dir.display()
                );
                Ok(LocDb::new())
            }
        }
    }

    /// # Errors
    ///
    /// Returns an error if the location database can't be loaded.
    pub fn open(&self) -> anyhow::Result<CatalogSet> {
        Ok(CatalogSet::new(&self.hidb_dir, self.load_locations()?))
    }
}

/// `tsv`-safe field: tabs and newlines would break the columns
pub(crate) fn tsv_field(value: &str) -> String {
    value.replace(['\t', '\n'], " ")
}

pub(crate) fn display_path(path: &Path) -> String {
    path.display().to_string()
}
