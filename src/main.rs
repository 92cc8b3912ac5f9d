mod batch;
mod checkpoint;
mod cli;
mod combine;
mod commands;
mod curves;
mod model;
mod service;
mod standardize;
mod table;
mod usage;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Extract(args) => commands::extract::run(args),
        Commands::Sample(args) => commands::sample::run(args),
        Commands::Answer(args) => commands::answer::run(args),
        Commands::Interpret(args) => commands::interpret::run(args),
        Commands::Pairs(args) => commands::pairs::run(args),
        Commands::Collate(args) => commands::collate::run(args),
        Commands::Filter(args) => commands::filter::run(args),
        Commands::Disagreements(args) => commands::disagreements::run(args),
        Commands::Curves(args) => commands::curves::run(args),
        Commands::Oracle(args) => commands::oracle::run(args),
        Commands::Fallback(args) => commands::fallback::run(args),
        Commands::Voting(args) => commands::voting::run(args),
        Commands::Folds(args) => commands::folds::run(args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
