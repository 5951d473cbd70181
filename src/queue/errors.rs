//! Queue errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::page::PageError;
use crate::page_io::PageIoError;

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors raised by the queue
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    PageIo(#[from] PageIoError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("invalid queue configuration: {0}")]
    Config(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("page {page_num} has a checkpoint but its page file is missing")]
    MissingPage { page_num: u32 },

    #[error("element of {size} bytes exceeds the maximum of {max} bytes per page")]
    ElementTooLarge { size: usize, max: usize },

    #[error("sequence number {0} is not held by any page")]
    UnknownSequence(u64),

    #[error("queue is closed")]
    Closed,
}

impl QueueError {
    /// Returns true if the queue must not continue on its current state
    pub fn is_fatal(&self) -> bool {
        match self {
            QueueError::Page(e) => e.is_fatal(),
            QueueError::PageIo(e) => e.is_corruption(),
            QueueError::Checkpoint(e) => e.is_fatal(),
            QueueError::MissingPage { .. } => true,
            QueueError::Config(_)
            | QueueError::Io { .. }
            | QueueError::ElementTooLarge { .. }
            | QueueError::UnknownSequence(_)
            | QueueError::Closed => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::Checkpoint;

    #[test]
    fn test_fatal_classification_preserved() {
        let cp = Checkpoint::new(0, 0, 1, 1, 2).unwrap();
        let err: QueueError = PageError::recovery_inconsistency(&cp, 1, 1).into();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("ACKQ_RECOVERY_INCONSISTENCY"));

        assert!(QueueError::MissingPage { page_num: 2 }.is_fatal());
        assert!(!QueueError::UnknownSequence(9).is_fatal());
        assert!(!QueueError::Closed.is_fatal());
    }
}
