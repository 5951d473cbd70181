//! CLI module for ackqueue
//!
//! Provides command-line interface for:
//! - init: Create the queue directory
//! - status: Recover the queue and report its pages
//! - push: Append elements
//! - read: Read unacknowledged elements
//! - ack: Acknowledge elements

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{ack, init, push, read, run, run_command, status};
pub use errors::{CliError, CliErrorCode, CliResult};
