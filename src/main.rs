// Entrypoint for the `pms` binary.
// Parses arguments, runs one command and turns any error into a message
// on stderr plus an exit code per error class.

use clap::Parser;
use pms_cli::cli::{self, Cli};
use pms_cli::error::{exit, exit_code_for};
use pms_cli::{logging, ui};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = Cli::parse();
    logging::init_logging(args.verbose);

    match cli::run(args) {
        Ok(()) => ExitCode::from(exit::OK),
        Err(err) => {
            ui::error(&format!("Error: {err:#}"));
            if let Some(hint) = cli::hint_for(&err) {
                ui::hint(hint);
            }
            ExitCode::from(exit_code_for(&err))
        }
    }
}
