use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    check::{self, CheckArgs},
    expand::{self, ExpandArgs},
    run::{self, RunArgs},
};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "phago-sweep",
    version,
    about = "Parameter sweeps for the phagocyte/fragment motility simulator"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute every run of a sweep plan.
    Run(RunArgs),
    /// Print the runs a plan expands to without touching the disk.
    Expand(ExpandArgs),
    /// Validate a plan against its template.
    Check(CheckArgs),
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run::run(&args),
        Command::Expand(args) => expand::run(&args),
        Command::Check(args) => check::run(&args),
    }
}
