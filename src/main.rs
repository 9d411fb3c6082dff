use clap::Parser;
use hidb::cli;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("hidb=debug,info")
    } else {
        EnvFilter::new("hidb=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        cli::Commands::Import(args) => {
            cli::import::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Find(args) => {
            cli::find::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::List(args) => {
            cli::report::run_list(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Stat(args) => {
            cli::report::run_stat(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Countries(args) => {
            cli::report::run_countries(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Unrecognized(args) => {
            cli::report::run_unrecognized(args, cli.format, cli.verbose)?;
        }
    }

    Ok(())
}
