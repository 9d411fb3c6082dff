use anyhow::Context;
use clap::Args;

use crate::cli::{tsv_field, CatalogArgs, OutputFormat};
use crate::matching::engine::QueryEngine;

#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// List serum names instead of antigen names
    #[arg(long)]
    pub sera: bool,
}

fn with_engine<F>(catalog: &CatalogArgs, f: F) -> anyhow::Result<()>
where
    F: FnOnce(&QueryEngine<'_>) -> anyhow::Result<()>,
{
    let mut set = catalog.open()?;
    let engine = set
        .engine(&catalog.virus_type)
        .with_context(|| format!("Failed to open {} hidb", catalog.virus_type))?;
    f(&engine)
}

fn print_list(title: &str, items: &[String], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            println!("{} ({})", title, items.len());
            for item in items {
                println!("  {item}");
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(items)?),
        OutputFormat::Tsv => {
            for item in items {
                println!("{}", tsv_field(item));
            }
        }
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the catalog can't be loaded.
pub fn run_list(args: ListArgs, format: OutputFormat, _verbose: bool) -> anyhow::Result<()> {
    with_engine(&args.catalog, |engine| {
        if args.sera {
            print_list("Sera", &engine.hidb().list_serum_names(), format)
        } else {
            print_list("Antigens", &engine.hidb().list_antigen_names(), format)
        }
    })
}

/// # Errors
///
/// Returns an error if the catalog can't be loaded.
pub fn run_stat(args: CatalogArgs, format: OutputFormat, _verbose: bool) -> anyhow::Result<()> {
    with_engine(&args, |engine| {
        let stat = engine.stat();
        match format {
            OutputFormat::Text => {
                println!("Antigens: {}\n", stat.total);
                println!(
                    "{:<10} {:<8} {:<8} {:<20} {:>6}",
                    "Type", "Lab", "Month", "Continent", "Count"
                );
                println!("{}", "-".repeat(56));
                for (virus_type, lab, year_month, continent, count) in stat.rows() {
                    println!("{virus_type:<10} {lab:<8} {year_month:<8} {continent:<20} {count:>6}");
                }
            }
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stat)?),
            OutputFormat::Tsv => {
                println!("virus_type\tlab\tyear_month\tcontinent\tcount");
                for (virus_type, lab, year_month, continent, count) in stat.rows() {
                    println!("{virus_type}\t{lab}\t{year_month}\t{continent}\t{count}");
                }
            }
        }
        Ok(())
    })
}

/// # Errors
///
/// Returns an error if the catalog can't be loaded.
pub fn run_countries(args: CatalogArgs, format: OutputFormat, _verbose: bool) -> anyhow::Result<()> {
    with_engine(&args, |engine| {
        print_list("Countries", &engine.all_countries(), format)
    })
}

/// # Errors
///
/// Returns an error if the catalog can't be loaded.
pub fn run_unrecognized(
    args: CatalogArgs,
    format: OutputFormat,
    _verbose: bool,
) -> anyhow::Result<()> {
    with_engine(&args, |engine| {
        print_list(
            "Unrecognized locations",
            &engine.unrecognized_locations(),
            format,
        )
    })
}
