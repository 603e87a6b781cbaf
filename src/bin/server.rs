//! SheetMate server binary.
//! Run with: cargo run --bin sheetmate-server

use std::process::ExitCode;

use sheetmate_agent::start_sheetmate;

fn main() -> ExitCode {
    start_sheetmate::run()
}
