use anyhow::Context;
use clap::Args;

use crate::catalog::store::{CanonicalAntigen, CanonicalSerum};
use crate::cli::{tsv_field, CatalogArgs, OutputFormat};
use crate::core::types::Score;
use crate::matching::engine::{QueryConfig, QueryEngine};
use crate::matching::refs::{in_country, in_date_range};
use crate::matching::scoring::FullScore;

/// How widely to search for antigen candidates
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum Search {
    /// Index bucket narrowed by host, location, isolation and year
    #[default]
    Indexed,
    /// Whole index bucket of the query location
    Fuzzy,
    /// Whole catalog
    ExtraFuzzy,
}

#[derive(Args)]
pub struct FindArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// Name to look up, optionally followed by qualifiers (passage,
    /// reassortant, serum id) or a keyword: EGG, CELL, REASSORTANT
    #[arg(required = true)]
    pub name: String,

    /// Search sera instead of antigens
    #[arg(long)]
    pub sera: bool,

    /// Require the name plus qualifiers to match exactly
    #[arg(long, conflicts_with_all = ["with_score", "lab_id"])]
    pub exact: bool,

    /// Rank the whole catalog and report the best tier with full scores
    #[arg(long)]
    pub with_score: bool,

    /// Treat the name as a lab id (a bare number is a CDC id)
    #[arg(long, conflicts_with = "sera")]
    pub lab_id: bool,

    /// Candidate search width for antigens
    #[arg(long, value_enum, default_value = "indexed")]
    pub search: Search,

    /// Keep antigens from this country only
    #[arg(long)]
    pub country: Option<String>,

    /// Keep antigens dated on or after this date (YYYY-MM-DD, may be truncated)
    #[arg(long)]
    pub begin: Option<String>,

    /// Keep antigens dated before this date
    #[arg(long)]
    pub end: Option<String>,

    /// Score at most this many candidates
    #[arg(long)]
    pub limit: Option<usize>,
}

/// One line of output
struct Hit<'a, T> {
    record: &'a T,
    name_score: Option<Score>,
    full_score: Option<FullScore>,
}

impl<'a, T> Hit<'a, T> {
    fn plain(record: &'a T) -> Self {
        Self {
            record,
            name_score: None,
            full_score: None,
        }
    }
}

fn describe(score: FullScore) -> String {
    match score {
        FullScore::Matched(value) => value.to_string(),
        FullScore::Unusable => "unusable".to_string(),
        FullScore::Skipped => "-".to_string(),
    }
}

/// # Errors
///
/// Returns an error if the catalog can't be loaded, or an exact lookup finds nothing.
pub fn run(args: FindArgs, format: OutputFormat, _verbose: bool) -> anyhow::Result<()> {
    let mut set = args.catalog.open()?;
    let config = QueryConfig {
        candidate_limit: args.limit,
        ..QueryConfig::default()
    };
    let engine = set
        .engine_with_config(&args.catalog.virus_type, config)
        .with_context(|| format!("Failed to open {} hidb", args.catalog.virus_type))?;

    if args.sera {
        let hits = find_sera(&engine, &args)?;
        print_sera(&hits, format)
    } else {
        let mut hits = find_antigens(&engine, &args)?;
        let begin = args.begin.as_deref().unwrap_or("");
        let end = args.end.as_deref().unwrap_or("");
        if let Some(country) = &args.country {
            hits.retain(|h| in_country(h.record, engine.locations(), country));
        }
        if !begin.is_empty() || !end.is_empty() {
            hits.retain(|h| in_date_range(h.record, begin, end));
        }
        print_antigens(&hits, format)
    }
}

fn find_antigens<'a>(
    engine: &QueryEngine<'a>,
    args: &FindArgs,
) -> anyhow::Result<Vec<Hit<'a, CanonicalAntigen>>> {
    let name = args.name.as_str();
    if args.exact {
        return Ok(vec![Hit::plain(engine.find_antigens_exact(name)?)]);
    }
    if args.lab_id {
        return Ok(engine
            .find_antigens_by_lab_id(name)
            .iter()
            .map(Hit::plain)
            .collect());
    }
    if args.with_score {
        return Ok(engine
            .find_antigens_with_score(name)
            .into_iter()
            .map(|(record, score)| Hit {
                record,
                name_score: None,
                full_score: Some(score),
            })
            .collect());
    }
    Ok(match args.search {
        Search::Indexed => engine
            .find_antigens_scored(name)
            .into_iter()
            .map(|s| Hit {
                record: s.record,
                name_score: Some(s.score.name),
                full_score: Some(s.score.full),
            })
            .collect(),
        Search::Fuzzy => engine
            .find_antigens_fuzzy(name)
            .into_iter()
            .map(Hit::plain)
            .collect(),
        Search::ExtraFuzzy => engine
            .find_antigens_extra_fuzzy(name)
            .into_iter()
            .map(Hit::plain)
            .collect(),
    })
}

fn find_sera<'a>(
    engine: &QueryEngine<'a>,
    args: &FindArgs,
) -> anyhow::Result<Vec<Hit<'a, CanonicalSerum>>> {
    let name = args.name.as_str();
    if args.exact {
        return Ok(vec![Hit::plain(engine.find_sera_exact(name)?)]);
    }
    if args.with_score {
        return Ok(engine
            .find_sera_with_score(name)
            .into_iter()
            .map(|(record, score)| Hit {
                record,
                name_score: None,
                full_score: Some(score),
            })
            .collect());
    }
    Ok(engine
        .find_sera_scored(name)
        .into_iter()
        .map(|s| Hit {
            record: s.record,
            name_score: Some(s.score.name),
            full_score: Some(s.score.full),
        })
        .collect())
}

fn print_antigens(hits: &[Hit<'_, CanonicalAntigen>], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            if hits.is_empty() {
                println!("No antigens found");
            }
            for hit in hits {
                let antigen = hit.record;
                let mut line = antigen.full_name();
                if !antigen.date().is_empty() {
                    line.push_str(&format!(" [{}]", antigen.date()));
                }
                if !antigen.lab_id.is_empty() {
                    line.push_str(&format!(" {}", antigen.lab_id.join(" ")));
                }
                line.push_str(&format!(" (tables: {})", antigen.number_of_tables()));
                if let Some(score) = hit.full_score {
                    line.push_str(&format!(" score: {}", describe(score)));
                }
                println!("{line}");
            }
        }
        OutputFormat::Json => {
            let output: Vec<_> = hits
                .iter()
                .map(|hit| {
                    serde_json::json!({
                        "full_name": hit.record.full_name(),
                        "antigen": hit.record,
                        "date": hit.record.date(),
                        "name_score": hit.name_score,
                        "full_score": hit.full_score.map(describe),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Tsv => {
            println!("full_name\tdate\tlab_ids\ttables\tmost_recent_table\tname_score\tfull_score");
            for hit in hits {
                let antigen = hit.record;
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                    tsv_field(&antigen.full_name()),
                    antigen.date(),
                    antigen.lab_id.join(","),
                    antigen.number_of_tables(),
                    antigen
                        .most_recent_table()
                        .map_or("", |t| t.table_id.as_str()),
                    hit.name_score.map_or(String::new(), |s| s.to_string()),
                    hit.full_score.map_or(String::new(), describe),
                );
            }
        }
    }
    Ok(())
}

fn print_sera(hits: &[Hit<'_, CanonicalSerum>], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            if hits.is_empty() {
                println!("No sera found");
            }
            for hit in hits {
                let serum = hit.record;
                let mut line = serum.full_name();
                if !serum.serum_species.is_empty() {
                    line.push_str(&format!(" {}", serum.serum_species));
                }
                line.push_str(&format!(" (tables: {})", serum.number_of_tables()));
                if let Some(homologous) = serum
                    .most_recent_table()
                    .and_then(|t| serum.homologous_for(&t.table_id))
                {
                    line.push_str(&format!(" homologous: {homologous}"));
                }
                if let Some(score) = hit.full_score {
                    line.push_str(&format!(" score: {}", describe(score)));
                }
                println!("{line}");
            }
        }
        OutputFormat::Json => {
            let output: Vec<_> = hits
                .iter()
                .map(|hit| {
                    serde_json::json!({
                        "full_name": hit.record.full_name(),
                        "serum": hit.record,
                        "name_score": hit.name_score,
                        "full_score": hit.full_score.map(describe),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Tsv => {
            println!("full_name\tserum_species\ttables\tmost_recent_table\tname_score\tfull_score");
            for hit in hits {
                let serum = hit.record;
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    tsv_field(&serum.full_name()),
                    serum.serum_species,
                    serum.number_of_tables(),
                    serum
                        .most_recent_table()
                        .map_or("", |t| t.table_id.as_str()),
                    hit.name_score.map_or(String::new(), |s| s.to_string()),
                    hit.full_score.map_or(String::new(), describe),
                );
            }
        }
    }
    Ok(())
}
