//! ackqueue CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`, which reports
//! failures as JSON on stderr. Exits non-zero on failure.

use ackqueue::cli;

fn main() {
    if cli::run().is_err() {
        std::process::exit(1);
    }
}
