//! Checkpoint persistence
//!
//! Files live next to the page files:
//! - `checkpoint.head` for the head page
//! - `checkpoint.<page_num>` for each tail page
//!
//! A write goes to `<name>.tmp`, is fsynced, renamed over `<name>`, and the
//! directory is fsynced. A crash leaves either the old or the new checkpoint,
//! never a mix.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::crash_point::{maybe_crash, points};
use crate::observability::{Event, Logger, Severity};

use super::errors::{CheckpointError, CheckpointResult};
use super::record::Checkpoint;

/// File name of the head page checkpoint
pub const HEAD_CHECKPOINT: &str = "checkpoint.head";

/// Durable store for page checkpoints
pub trait CheckpointIo {
    /// Reads and validates the checkpoint named `name`
    fn read(&self, name: &str) -> CheckpointResult<Checkpoint>;

    /// Atomically replaces the checkpoint named `name`
    fn write(&self, name: &str, checkpoint: &Checkpoint) -> CheckpointResult<()>;

    /// Deletes the checkpoint named `name`; a missing file is not an error
    fn purge(&self, name: &str) -> CheckpointResult<()>;

    /// Returns true if the checkpoint named `name` exists
    fn exists(&self, name: &str) -> bool;

    /// Name of the head page checkpoint
    fn head_file_name(&self) -> String {
        HEAD_CHECKPOINT.to_string()
    }

    /// Name of the checkpoint of tail page `page_num`
    fn tail_file_name(&self, page_num: u32) -> String {
        format!("checkpoint.{}", page_num)
    }
}

/// Checkpoints stored as files in the queue directory
#[derive(Debug, Clone)]
pub struct FileCheckpointIo {
    dir: PathBuf,
}

impl FileCheckpointIo {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn sync_dir(&self) -> CheckpointResult<()> {
        let dir = OpenOptions::new()
            .read(true)
            .open(&self.dir)
            .map_err(|e| CheckpointError::io(&self.dir, "failed to open directory for fsync", e))?;
        dir.sync_all()
            .map_err(|e| CheckpointError::io(&self.dir, "failed to fsync directory", e))
    }
}

impl CheckpointIo for FileCheckpointIo {
    fn read(&self, name: &str) -> CheckpointResult<Checkpoint> {
        let path = self.path(name);
        let bytes =
            fs::read(&path).map_err(|e| CheckpointError::io(&path, "failed to read checkpoint", e))?;
        Checkpoint::from_bytes(name, &bytes)
    }

    fn write(&self, name: &str, checkpoint: &Checkpoint) -> CheckpointResult<()> {
        let path = self.path(name);
        let tmp_path = self.path(&format!("{}.tmp", name));

        let mut file = File::create(&tmp_path)
            .map_err(|e| CheckpointError::io(&tmp_path, "failed to create checkpoint", e))?;
        file.write_all(&checkpoint.to_bytes())
            .map_err(|e| CheckpointError::io(&tmp_path, "failed to write checkpoint", e))?;
        file.sync_all()
            .map_err(|e| CheckpointError::io(&tmp_path, "failed to fsync checkpoint", e))?;
        drop(file);

        maybe_crash(points::CHECKPOINT_BEFORE_RENAME);

        fs::rename(&tmp_path, &path)
            .map_err(|e| CheckpointError::io(&path, "failed to install checkpoint", e))?;
        self.sync_dir()?;

        maybe_crash(points::CHECKPOINT_AFTER_RENAME);

        if Logger::enabled(Severity::Trace) {
            Logger::trace(
                Event::CheckpointWritten.as_str(),
                &[
                    ("name", name),
                    ("page_num", &checkpoint.page_num().to_string()),
                    ("min_seq_num", &checkpoint.min_seq_num().to_string()),
                    ("element_count", &checkpoint.element_count().to_string()),
                    ("first_unacked_seq_num", &checkpoint.first_unacked_seq_num().to_string()),
                ],
            );
        }
        Ok(())
    }

    fn purge(&self, name: &str) -> CheckpointResult<()> {
        let path = self.path(name);
        match fs::remove_file(&path) {
            Ok(()) => self.sync_dir(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CheckpointError::io(&path, "failed to delete checkpoint", e)),
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_names() {
        let io = FileCheckpointIo::new("/q");
        assert_eq!(io.head_file_name(), "checkpoint.head");
        assert_eq!(io.tail_file_name(12), "checkpoint.12");
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let io = FileCheckpointIo::new(dir.path());
        let cp = Checkpoint::new(2, 1, 14, 10, 8).unwrap();

        io.write("checkpoint.2", &cp).unwrap();
        assert!(io.exists("checkpoint.2"));
        assert!(!dir.path().join("checkpoint.2.tmp").exists());
        assert_eq!(io.read("checkpoint.2").unwrap(), cp);
    }

    #[test]
    fn test_write_replaces_previous() {
        let dir = TempDir::new().unwrap();
        let io = FileCheckpointIo::new(dir.path());
        io.write(HEAD_CHECKPOINT, &Checkpoint::empty(0, 0)).unwrap();

        let next = Checkpoint::new(0, 0, 1, 1, 3).unwrap();
        io.write(HEAD_CHECKPOINT, &next).unwrap();
        assert_eq!(io.read(HEAD_CHECKPOINT).unwrap(), next);
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let io = FileCheckpointIo::new(dir.path());
        let err = io.read("checkpoint.5").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_read_corrupted_is_fatal() {
        let dir = TempDir::new().unwrap();
        let io = FileCheckpointIo::new(dir.path());
        io.write("checkpoint.1", &Checkpoint::new(1, 1, 3, 1, 5).unwrap())
            .unwrap();

        let path = dir.path().join("checkpoint.1");
        let mut bytes = fs::read(&path).unwrap();
        bytes[12] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        let err = io.read("checkpoint.1").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_purge_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let io = FileCheckpointIo::new(dir.path());
        io.write("checkpoint.1", &Checkpoint::empty(1, 1)).unwrap();
        io.purge("checkpoint.1").unwrap();
        assert!(!io.exists("checkpoint.1"));
        io.purge("checkpoint.1").unwrap();
    }
}
