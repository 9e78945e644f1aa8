//! `oracled` CLI binary entry point.
//!
//! This binary requires the `cli` feature to be enabled.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "oracled", version, about = "Oracle gateway node")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Run(oracle::cli::run::Args),
    Config(oracle::cli::config::Args),
    Keygen(oracle::cli::keygen::Args),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => oracle::cli::run::execute(args).await,
        Commands::Config(args) => oracle::cli::config::execute(args),
        Commands::Keygen(args) => oracle::cli::keygen::execute(args),
    }
}
