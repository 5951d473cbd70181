//! Page storage handles
//!
//! A storage handle owns the durable bytes of one page. It reports the
//! minimum sequence number and element count actually persisted, which page
//! recovery compares against the page's checkpoint.
//!
//! The binary layout of a page lives entirely behind [`PageIo`]; the rest of
//! the queue only sees elements and sequence numbers.

mod errors;
mod file;
mod frame;

pub use errors::{PageIoError, PageIoResult};
pub use file::{page_file_name, FilePageIo};
pub use frame::{frame_size, FRAME_OVERHEAD, PAGE_HEADER_SIZE};

/// One queued element as read back from a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub seq_num: u64,
    pub data: Vec<u8>,
}

/// Durable storage for the elements of one page.
///
/// Implementations are used from one thread at a time; the queue holds each
/// handle exclusively.
pub trait PageIo {
    /// Page number this handle stores
    fn page_num(&self) -> u32;

    /// Sequence number of the first persisted element, 0 if the page is empty
    fn min_seq_num(&self) -> u64;

    /// Number of persisted elements
    fn element_count(&self) -> u32;

    /// Returns true if an element of `bytes` bytes still fits
    fn has_space(&self, bytes: usize) -> bool;

    /// Appends an element. Sequence numbers within a page must be contiguous.
    fn write(&mut self, data: &[u8], seq_num: u64) -> PageIoResult<()>;

    /// Reads up to `limit` elements starting at `seq_num`
    fn read(&mut self, seq_num: u64, limit: usize) -> PageIoResult<Vec<Element>>;

    /// Attaches the handle to its durable bytes so it can be read or written
    fn activate(&mut self) -> PageIoResult<()>;

    /// Forces appended elements to durable storage
    fn ensure_persisted(&mut self) -> PageIoResult<()>;

    /// Releases the handle. Valid exactly once; later calls fail with
    /// [`PageIoError::Released`].
    fn release(&mut self) -> PageIoResult<()>;

    /// Deletes the durable bytes. The handle is unusable afterwards.
    fn purge(&mut self) -> PageIoResult<()>;
}
