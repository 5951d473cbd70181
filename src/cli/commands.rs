//! CLI command implementations
//!
//! Every command except `init` recovers the queue from disk, performs one
//! operation and closes it again. The read position is not persisted, so
//! `read` always starts from the oldest unacknowledged element.

use std::path::Path;

use serde_json::{json, Value};

use crate::checkpoint::{CheckpointIo, FileCheckpointIo};
use crate::observability::{Logger, Severity, LOG_LEVEL_ENV};
use crate::queue::{Queue, QueueConfig};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_lines, write_error, write_response};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command. Lifecycle
/// logging below WARN is off unless `ACKQUEUE_LOG` asks for it, so stdout
/// carries only the JSON response.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    if std::env::var_os(LOG_LEVEL_ENV).is_none() {
        Logger::set_min_severity(Severity::Warn);
    }
    let result = run_command(cli.command);
    if let Err(ref e) = result {
        write_error(e.code_str(), e.message())?;
    }
    result
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    let data = match cmd {
        Command::Init { config } => init(&config)?,
        Command::Status { config } => status(&config)?,
        Command::Push { config, data } => {
            let data = if data.is_empty() { read_lines()? } else { data };
            push(&config, &data)?
        }
        Command::Read { config, limit } => read(&config, limit)?,
        Command::Ack { config, seq_nums } => ack(&config, &seq_nums)?,
    };
    write_response(data)
}

/// Creates the queue directory with an empty head page
pub fn init(config_path: &Path) -> CliResult<Value> {
    let config = load_config(config_path)?;
    if is_initialized(&config) {
        return Err(CliError::already_initialized());
    }

    let mut queue = Queue::open(config)?;
    let head_page_num = queue.head_page_num();
    queue.close()?;
    Ok(json!({"initialized": true, "head_page_num": head_page_num}))
}

/// Reports queue status without sealing the head page
pub fn status(config_path: &Path) -> CliResult<Value> {
    let config = load_config(config_path)?;
    if !is_initialized(&config) {
        return Err(CliError::not_initialized());
    }
    Ok(serde_json::to_value(Queue::inspect(config)?)?)
}

pub fn push(config_path: &Path, data: &[String]) -> CliResult<Value> {
    let mut queue = open_initialized(config_path)?;
    let mut seq_nums = Vec::with_capacity(data.len());
    for element in data {
        seq_nums.push(queue.write(element.as_bytes())?);
    }
    queue.close()?;
    Ok(json!({"seq_nums": seq_nums}))
}

pub fn read(config_path: &Path, limit: usize) -> CliResult<Value> {
    let mut queue = open_initialized(config_path)?;
    let mut elements = Vec::new();
    while elements.len() < limit {
        let batch = queue.read_batch(limit - elements.len())?;
        if batch.is_empty() {
            break;
        }
        elements.extend(batch.into_elements().into_iter().map(|e| {
            json!({
                "seq_num": e.seq_num,
                "data": String::from_utf8_lossy(&e.data),
            })
        }));
    }
    queue.close()?;
    Ok(json!({"elements": elements}))
}

pub fn ack(config_path: &Path, seq_nums: &[u64]) -> CliResult<Value> {
    let mut queue = open_initialized(config_path)?;
    queue.ack(seq_nums)?;
    let unacked = queue.status().unacked_count;
    queue.close()?;
    Ok(json!({"acked": seq_nums.len(), "unacked_count": unacked}))
}

fn load_config(config_path: &Path) -> CliResult<QueueConfig> {
    Ok(QueueConfig::load(config_path)?)
}

fn is_initialized(config: &QueueConfig) -> bool {
    let checkpoints = FileCheckpointIo::new(&config.dir);
    checkpoints.exists(&checkpoints.head_file_name())
}

fn open_initialized(config_path: &Path) -> CliResult<Queue> {
    let config = load_config(config_path)?;
    if !is_initialized(&config) {
        return Err(CliError::not_initialized());
    }
    Ok(Queue::open(config)?)
}

#[cfg(test)]
mod tests {
    use super::super::errors::CliErrorCode;
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("ackqueue.json");
        let config = json!({
            "dir": dir.path().join("queue"),
            "page_capacity": 256,
        });
        fs::write(&path, config.to_string()).unwrap();
        path
    }

    #[test]
    fn test_init_twice_fails() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir);

        assert_eq!(init(&config).unwrap()["initialized"], true);
        let err = init(&config).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::AlreadyInitialized);
    }

    #[test]
    fn test_commands_require_init() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir);
        let err = status(&config).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::NotInitialized);
    }

    #[test]
    fn test_push_read_ack() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir);
        init(&config).unwrap();

        let pushed = push(&config, &["one".to_string(), "two".to_string()]).unwrap();
        assert_eq!(pushed["seq_nums"], json!([1, 2]));

        let read_back = read(&config, 10).unwrap();
        assert_eq!(read_back["elements"][0]["data"], "one");
        assert_eq!(read_back["elements"][1]["seq_num"], 2);

        let acked = ack(&config, &[1]).unwrap();
        assert_eq!(acked["unacked_count"], 1);

        let read_back = read(&config, 10).unwrap();
        assert_eq!(read_back["elements"], json!([{"seq_num": 2, "data": "two"}]));
    }

    #[test]
    fn test_status_keeps_head_page() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir);
        init(&config).unwrap();
        push(&config, &["one".to_string()]).unwrap();

        let head = status(&config).unwrap()["head_page_num"].clone();
        assert_eq!(status(&config).unwrap()["head_page_num"], head);
        assert_eq!(status(&config).unwrap()["unacked_count"], 1);

        let next = head.as_u64().unwrap() + 1;
        assert!(!dir.path().join("queue").join(format!("page.{}", next)).exists());
    }

    #[test]
    fn test_missing_config() {
        let dir = TempDir::new().unwrap();
        let err = status(&dir.path().join("nope.json")).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }
}
