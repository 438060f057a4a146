mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{import, status};
use tracing_subscriber::EnvFilter;

/// Log to stderr. `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    init_logging(cli.verbose);
    match &cli.command {
        Commands::Import(args) => import::run(&cli, args),
        Commands::Status(args) => status::run(&cli, args),
    }
}

fn main() -> anyhow::Result<()> { run() }
