//! promptsync - sync a universal prompt with editor-native rule files

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = promptsync::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
