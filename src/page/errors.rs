//! Page error types
//!
//! Error codes:
//! - ACKQ_RECOVERY_INCONSISTENCY (FATAL)
//! - ACKQ_RESOURCE_ACQUISITION_FAILED (FATAL)
//! - ACKQ_SEQUENCE_OUT_OF_RANGE (ERROR)
//! - ACKQ_PAGE_NOT_HEAD (ERROR)
//! - ACKQ_PAGE_FULL (ERROR)
//! - ACKQ_PAGE_IO_FAILED (ERROR)

use std::fmt;

use crate::checkpoint::Checkpoint;
use crate::page_io::PageIoError;

/// Severity levels for page errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The operation failed; the page stays usable
    Error,
    /// The page cannot be trusted; the queue must halt or abandon it
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Page error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageErrorCode {
    /// Checkpoint and page file disagree on `min_seq_num` or `element_count`
    RecoveryInconsistency,
    /// The storage handle could not be attached while constructing a page
    ResourceAcquisitionFailure,
    /// Sequence number does not belong to the page
    SequenceOutOfRange,
    /// Write or behead attempted on a tail page
    NotHead,
    /// Element does not fit in the page
    PageFull,
    /// Storage handle failure after construction
    PageIo,
}

impl PageErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            PageErrorCode::RecoveryInconsistency => "ACKQ_RECOVERY_INCONSISTENCY",
            PageErrorCode::ResourceAcquisitionFailure => "ACKQ_RESOURCE_ACQUISITION_FAILED",
            PageErrorCode::SequenceOutOfRange => "ACKQ_SEQUENCE_OUT_OF_RANGE",
            PageErrorCode::NotHead => "ACKQ_PAGE_NOT_HEAD",
            PageErrorCode::PageFull => "ACKQ_PAGE_FULL",
            PageErrorCode::PageIo => "ACKQ_PAGE_IO_FAILED",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            PageErrorCode::RecoveryInconsistency | PageErrorCode::ResourceAcquisitionFailure => {
                Severity::Fatal
            }
            PageErrorCode::SequenceOutOfRange
            | PageErrorCode::NotHead
            | PageErrorCode::PageFull
            | PageErrorCode::PageIo => Severity::Error,
        }
    }
}

impl fmt::Display for PageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Page error with context
#[derive(Debug)]
pub struct PageError {
    code: PageErrorCode,
    page_num: u32,
    message: String,
    source: Option<PageIoError>,
}

impl PageError {
    /// Checkpoint and storage handle disagree about what the page holds
    pub fn recovery_inconsistency(checkpoint: &Checkpoint, storage_min_seq_num: u64, storage_element_count: u32) -> Self {
        Self {
            code: PageErrorCode::RecoveryInconsistency,
            page_num: checkpoint.page_num(),
            message: format!(
                "checkpoint minSeqNum={} or elementCount={} is different than page file minSeqNum={} or elementCount={}",
                checkpoint.min_seq_num(),
                checkpoint.element_count(),
                storage_min_seq_num,
                storage_element_count
            ),
            source: None,
        }
    }

    /// The storage handle failed while being attached during construction
    pub fn resource_acquisition(page_num: u32, source: PageIoError) -> Self {
        Self {
            code: PageErrorCode::ResourceAcquisitionFailure,
            page_num,
            message: "failed to attach page storage".to_string(),
            source: Some(source),
        }
    }

    /// Sequence number outside `[min_seq_num, min_seq_num + element_count)`
    pub fn sequence_out_of_range(page_num: u32, seq_num: u64, min_seq_num: u64, element_count: u32) -> Self {
        Self {
            code: PageErrorCode::SequenceOutOfRange,
            page_num,
            message: format!(
                "sequence number {} outside page range [{}, {})",
                seq_num,
                min_seq_num,
                min_seq_num + element_count as u64
            ),
            source: None,
        }
    }

    /// Operation reserved for the head page
    pub fn not_head(page_num: u32, operation: &str) -> Self {
        Self {
            code: PageErrorCode::NotHead,
            page_num,
            message: format!("{} requires the head page", operation),
            source: None,
        }
    }

    /// Wraps a storage handle failure, classifying a full page
    pub fn io(page_num: u32, context: &str, source: PageIoError) -> Self {
        let code = match source {
            PageIoError::NoSpace { .. } => PageErrorCode::PageFull,
            _ => PageErrorCode::PageIo,
        };
        Self {
            code,
            page_num,
            message: context.to_string(),
            source: Some(source),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> PageErrorCode {
        self.code
    }

    /// Returns the page the error concerns
    pub fn page_num(&self) -> u32 {
        self.page_num
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the storage failure behind this error, if any
    pub fn io_source(&self) -> Option<&PageIoError> {
        self.source.as_ref()
    }

    /// Returns whether the queue must not proceed on this page
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: page {}: {}",
            self.code.severity(),
            self.code.code(),
            self.page_num,
            self.message
        )?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for PageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for page operations
pub type PageResult<T> = Result<T, PageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            PageErrorCode::RecoveryInconsistency.code(),
            "ACKQ_RECOVERY_INCONSISTENCY"
        );
        assert_eq!(
            PageErrorCode::ResourceAcquisitionFailure.code(),
            "ACKQ_RESOURCE_ACQUISITION_FAILED"
        );
    }

    #[test]
    fn test_construction_failures_are_fatal() {
        assert_eq!(PageErrorCode::RecoveryInconsistency.severity(), Severity::Fatal);
        assert_eq!(PageErrorCode::ResourceAcquisitionFailure.severity(), Severity::Fatal);
        assert_eq!(PageErrorCode::SequenceOutOfRange.severity(), Severity::Error);
    }

    #[test]
    fn test_inconsistency_display() {
        let cp = Checkpoint::new(3, 3, 100, 100, 10).unwrap();
        let err = PageError::recovery_inconsistency(&cp, 100, 9);
        let display = err.to_string();
        assert!(display.contains("FATAL"));
        assert!(display.contains("ACKQ_RECOVERY_INCONSISTENCY"));
        assert!(display.contains("elementCount=10"));
        assert!(display.contains("elementCount=9"));
        assert_eq!(err.page_num(), 3);
    }

    #[test]
    fn test_no_space_maps_to_page_full() {
        let err = PageError::io(
            1,
            "write failed",
            PageIoError::NoSpace {
                page_num: 1,
                needed: 40,
                remaining: 8,
            },
        );
        assert_eq!(err.code(), PageErrorCode::PageFull);
        assert!(std::error::Error::source(&err).is_some());
    }
}
