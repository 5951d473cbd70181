//! Checkpoint errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for checkpoint operations
pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// Errors raised while building, encoding or persisting checkpoints
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error(
        "invalid checkpoint: first_unacked_seq_num {first_unacked_seq_num} outside \
         [{min_seq_num}, {min_seq_num} + {element_count}]"
    )]
    InvalidRange {
        min_seq_num: u64,
        element_count: u32,
        first_unacked_seq_num: u64,
    },

    #[error("checkpoint {name} is corrupted: {reason}")]
    Corrupted { name: String, reason: String },

    #[error("checkpoint {name} has unsupported version {version}")]
    UnsupportedVersion { name: String, version: u16 },

    #[error("I/O error on checkpoint {path}: {context}: {source}")]
    Io {
        path: PathBuf,
        context: &'static str,
        #[source]
        source: io::Error,
    },
}

impl CheckpointError {
    pub(crate) fn io(path: impl Into<PathBuf>, context: &'static str, source: io::Error) -> Self {
        CheckpointError::Io {
            path: path.into(),
            context,
            source,
        }
    }

    /// Returns true if the checkpoint file does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, CheckpointError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }

    /// Returns true if the persisted checkpoint cannot be trusted
    ///
    /// A damaged checkpoint leaves the page state unknown, so the queue must
    /// not open on top of it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CheckpointError::Corrupted { .. }
                | CheckpointError::UnsupportedVersion { .. }
                | CheckpointError::InvalidRange { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        let err = CheckpointError::io(
            "/q/checkpoint.head",
            "failed to read checkpoint",
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert!(err.is_not_found());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_corruption_is_fatal() {
        let err = CheckpointError::Corrupted {
            name: "checkpoint.3".into(),
            reason: "checksum mismatch".into(),
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("checkpoint.3"));
    }
}
