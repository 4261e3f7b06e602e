//! Entry point for the `wbk` command.
#![forbid(unsafe_code)]

use wbk_cli::CliError;

fn main() {
    match wbk_cli::run() {
        Ok(()) => {}
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            eprintln!("wbk: {err}");
            std::process::exit(1);
        }
    }
}
