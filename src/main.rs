use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod core;
mod dataset;
mod matching;
mod utils;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity flag
    let filter = if cli.verbose {
        EnvFilter::new("ua_solver=debug,info")
    } else {
        EnvFilter::new("ua_solver=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        cli::Commands::Match(args) => {
            cli::identify::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Dataset(args) => {
            cli::dataset::run(args, cli.format, cli.verbose)?;
        }
    }

    Ok(())
}
