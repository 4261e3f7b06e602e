//! Command-line interface for bulk loading CSV data into a Wikibase store.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod error;
mod fs;
mod load;

pub use error::CliError;

use load::{LoadArgs, run_load};

pub(crate) const ARG_MAPPING: &str = "mapping";
pub(crate) const ARG_DATABASE: &str = "database";
pub(crate) const ARG_CHUNK_SIZE: &str = "chunk-size";
pub(crate) const ARG_LANGUAGE: &str = "language";
pub(crate) const ENV_MAPPING: &str = "WBK_CMDS_LOAD_MAPPING";
pub(crate) const ENV_DATABASE: &str = "WBK_CMDS_LOAD_DATABASE";

/// Run the CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Load(args) => run_load(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "wbk",
    about = "Bulk load CSV data into a Wikibase entity store",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply a mapping configuration to its CSV files.
    Load(LoadArgs),
}

#[cfg(test)]
mod tests;
