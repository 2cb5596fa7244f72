mod cli;
mod report;

use clap::Parser;
use tracing::Level;

fn main() -> miette::Result<()> {
    let args = cli::Cli::parse();

    let level = match (args.verbose, args.trace) {
        (0, false) => Level::WARN,
        (0, true) | (1, _) => Level::INFO,
        (2, _) => Level::DEBUG,
        _ => Level::TRACE,
    };
    // stdout is for artifacts
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(level)
        .init();

    cli::run(args)
}
