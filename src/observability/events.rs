//! Observable queue lifecycle events

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Queue lifecycle
    /// Queue closed
    QueueClosed,

    // Page construction
    /// Fresh head page created
    HeadPageCreated,
    /// Head page rebuilt from its checkpoint
    HeadPageRecovered,
    /// Tail page rebuilt from its checkpoint
    TailPageRecovered,
    /// Checkpoint and page file disagree
    RecoveryInconsistency,
    /// Storage handle could not be attached during construction
    ResourceAcquisitionFailed,
    /// Releasing a storage handle failed on an error path
    StorageReleaseFailed,
    /// Head page file was ahead of its checkpoint and the checkpoint was rebuilt
    HeadCheckpointReconciled,

    // Page rotation and retirement
    /// Head page sealed into a tail page
    PageBeheaded,
    /// Fully acknowledged page deleted
    PagePurged,
    /// Page file without a checkpoint deleted on open
    OrphanPageRemoved,

    // Durability
    /// Checkpoint written
    CheckpointWritten,
    /// Torn trailing frame dropped from a head page file
    PageTornWriteTruncated,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::QueueClosed => "QUEUE_CLOSED",

            Event::HeadPageCreated => "HEAD_PAGE_CREATED",
            Event::HeadPageRecovered => "HEAD_PAGE_RECOVERED",
            Event::TailPageRecovered => "TAIL_PAGE_RECOVERED",
            Event::RecoveryInconsistency => "RECOVERY_INCONSISTENCY",
            Event::ResourceAcquisitionFailed => "RESOURCE_ACQUISITION_FAILED",
            Event::StorageReleaseFailed => "STORAGE_RELEASE_FAILED",
            Event::HeadCheckpointReconciled => "HEAD_CHECKPOINT_RECONCILED",

            Event::PageBeheaded => "PAGE_BEHEADED",
            Event::PagePurged => "PAGE_PURGED",
            Event::OrphanPageRemoved => "ORPHAN_PAGE_REMOVED",

            Event::CheckpointWritten => "CHECKPOINT_WRITTEN",
            Event::PageTornWriteTruncated => "PAGE_TORN_WRITE_TRUNCATED",
        }
    }

    /// Returns true if this event means the queue must not proceed
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::RecoveryInconsistency)
    }

    /// Returns true if this event signals a problem short of fatal
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Event::ResourceAcquisitionFailed
                | Event::StorageReleaseFailed
                | Event::HeadCheckpointReconciled
                | Event::PageTornWriteTruncated
                | Event::OrphanPageRemoved
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
