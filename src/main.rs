//! Binary entrypoint that launches the SheetMate agent server.

use std::process::ExitCode;

use sheetmate_agent::start_sheetmate;

/// Start the server with configuration taken from the environment.
fn main() -> ExitCode {
    start_sheetmate::run()
}
