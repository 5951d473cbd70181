//! CLI argument definitions using clap
//!
//! Commands:
//! - ackqueue init --config <path>
//! - ackqueue status --config <path>
//! - ackqueue push --config <path> [DATA]...
//! - ackqueue read --config <path> [--limit <n>]
//! - ackqueue ack --config <path> <SEQ_NUM>...

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ackqueue - a durable, acknowledged FIFO queue on local disk
#[derive(Parser, Debug)]
#[command(name = "ackqueue")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new queue directory
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./ackqueue.json")]
        config: PathBuf,
    },

    /// Recover the queue and report its pages
    Status {
        /// Path to configuration file
        #[arg(long, default_value = "./ackqueue.json")]
        config: PathBuf,
    },

    /// Append elements; reads one element per stdin line when none are given
    Push {
        /// Path to configuration file
        #[arg(long, default_value = "./ackqueue.json")]
        config: PathBuf,

        /// Element payloads
        data: Vec<String>,
    },

    /// Read unacknowledged elements, oldest first
    Read {
        /// Path to configuration file
        #[arg(long, default_value = "./ackqueue.json")]
        config: PathBuf,

        /// Maximum number of elements to return
        #[arg(long, default_value_t = 16)]
        limit: usize,
    },

    /// Acknowledge elements by sequence number
    Ack {
        /// Path to configuration file
        #[arg(long, default_value = "./ackqueue.json")]
        config: PathBuf,

        /// Sequence numbers to acknowledge
        #[arg(required = true)]
        seq_nums: Vec<u64>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_push() {
        let cli = Cli::try_parse_from(["ackqueue", "push", "--config", "q.json", "a", "b"]).unwrap();
        match cli.command {
            Command::Push { config, data } => {
                assert_eq!(config, PathBuf::from("q.json"));
                assert_eq!(data, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_ack_requires_seq_nums() {
        assert!(Cli::try_parse_from(["ackqueue", "ack"]).is_err());
        let cli = Cli::try_parse_from(["ackqueue", "ack", "3", "4"]).unwrap();
        assert!(matches!(cli.command, Command::Ack { seq_nums, .. } if seq_nums == vec![3, 4]));
    }

    #[test]
    fn test_read_default_limit() {
        let cli = Cli::try_parse_from(["ackqueue", "read"]).unwrap();
        assert!(matches!(cli.command, Command::Read { limit: 16, .. }));
    }
}
