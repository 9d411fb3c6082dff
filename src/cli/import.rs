use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tracing::{info, warn};

use crate::catalog::store::{HiDb, HiDbError, MergeSummary};
use crate::cli::{display_path, CatalogArgs, OutputFormat};
use crate::core::types::VirusType;
use crate::parsing::chart::parse_chart_file;

#[derive(Args)]
pub struct ImportArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// Chart files (JSON, optionally gzipped)
    #[arg(required = true, num_args = 1..)]
    pub charts: Vec<PathBuf>,

    /// Output snapshot (defaults to the virus type's snapshot in the catalog directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Merge into an existing snapshot instead of starting empty
    #[arg(long)]
    pub append_to: Option<PathBuf>,

    /// Log and skip charts whose table id is already in the catalog
    #[arg(long)]
    pub skip_duplicates: bool,

    /// Write indented JSON
    #[arg(long)]
    pub pretty: bool,
}

/// # Errors
///
/// Returns an error if a chart can't be parsed or merged, or the snapshot
/// can't be read or written.
pub fn run(args: ImportArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let virus_type = args.catalog.virus_type()?;
    let set = args.catalog.open()?;

    let mut hidb = match &args.append_to {
        Some(path) => HiDb::load(path)
            .with_context(|| format!("Failed to load hidb {}", path.display()))?,
        None => HiDb::new(),
    };

    let mut summaries: Vec<MergeSummary> = Vec::new();
    let mut duplicates = 0usize;
    for path in &args.charts {
        let chart = parse_chart_file(path)
            .with_context(|| format!("Failed to parse chart {}", path.display()))?;
        if !chart.info.virus_type.is_empty()
            && VirusType::parse(&chart.info.virus_type) != Some(virus_type)
        {
            warn!(
                "{}: virus type {} imported into the {} catalog",
                path.display(),
                chart.info.virus_type,
                virus_type
            );
        }
        match hidb.merge(&chart) {
            Ok(summary) => summaries.push(summary),
            Err(HiDbError::DuplicateTable(table_id)) if args.skip_duplicates => {
                warn!("{}: chart {} already imported, skipped", path.display(), table_id);
                duplicates += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to merge {}", path.display()))
            }
        }
    }

    hidb.rebuild_index(set.locations());

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| set.snapshot_path(virus_type));
    hidb.save(&output, args.pretty)
        .with_context(|| format!("Failed to write hidb {}", output.display()))?;

    info!(
        "Imported {} charts ({} duplicates skipped): {} antigens, {} sera in {}",
        summaries.len(),
        duplicates,
        hidb.antigens().len(),
        hidb.sera().len(),
        output.display()
    );

    match format {
        OutputFormat::Text => {
            if verbose {
                for s in &summaries {
                    println!(
                        "{}: {} new antigens, {} new sera, {} distinct",
                        s.table_id, s.new_antigens, s.new_sera, s.skipped
                    );
                }
            }
            println!(
                "{}: {} tables, {} antigens, {} sera",
                display_path(&output),
                hidb.charts().len(),
                hidb.antigens().len(),
                hidb.sera().len()
            );
        }
        OutputFormat::Json => {
            let tables: Vec<_> = summaries
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "table_id": s.table_id,
                        "new_antigens": s.new_antigens,
                        "new_sera": s.new_sera,
                        "distinct": s.skipped,
                    })
                })
                .collect();
            let output = serde_json::json!({
                "output": display_path(&output),
                "imported": tables,
                "duplicates_skipped": duplicates,
                "tables": hidb.charts().len(),
                "antigens": hidb.antigens().len(),
                "sera": hidb.sera().len(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Tsv => {
            println!("table_id\tnew_antigens\tnew_sera\tdistinct");
            for s in &summaries {
                println!(
                    "{}\t{}\t{}\t{}",
                    s.table_id, s.new_antigens, s.new_sera, s.skipped
                );
            }
        }
    }

    Ok(())
}
