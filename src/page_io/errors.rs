//! Page data file errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for page IO operations
pub type PageIoResult<T> = Result<T, PageIoError>;

/// Errors raised by a page storage handle
#[derive(Debug, Error)]
pub enum PageIoError {
    #[error("I/O error on {path}: {context}: {source}")]
    Io {
        path: PathBuf,
        context: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("page {page_num} corrupted at offset {offset}: {reason}")]
    Corrupted {
        page_num: u32,
        offset: u64,
        reason: String,
    },

    #[error("page {page_num} has unsupported format version {version}")]
    UnsupportedVersion { page_num: u32, version: u8 },

    #[error("page {page_num} has no space for {needed} bytes ({remaining} remaining)")]
    NoSpace {
        page_num: u32,
        needed: usize,
        remaining: usize,
    },

    #[error("page {page_num} expected sequence number {expected}, got {actual}")]
    NonContiguousSequence {
        page_num: u32,
        expected: u64,
        actual: u64,
    },

    #[error("sequence number {seq_num} is not stored in page {page_num}")]
    SequenceNotFound { page_num: u32, seq_num: u64 },

    #[error("page {page_num} storage handle is not active")]
    Inactive { page_num: u32 },

    #[error("page {page_num} storage handle was already released")]
    Released { page_num: u32 },
}

impl PageIoError {
    pub(crate) fn io(path: impl Into<PathBuf>, context: &'static str, source: io::Error) -> Self {
        PageIoError::Io {
            path: path.into(),
            context,
            source,
        }
    }

    /// Returns true if the durable bytes themselves are damaged
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            PageIoError::Corrupted { .. }
                | PageIoError::UnsupportedVersion { .. }
                | PageIoError::NonContiguousSequence { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corruption_classification() {
        let corrupted = PageIoError::Corrupted {
            page_num: 1,
            offset: 17,
            reason: "checksum mismatch".into(),
        };
        assert!(corrupted.is_corruption());
        assert!(corrupted.to_string().contains("offset 17"));

        let released = PageIoError::Released { page_num: 1 };
        assert!(!released.is_corruption());
    }
}
