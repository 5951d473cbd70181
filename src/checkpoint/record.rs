//! Checkpoint record and its binary encoding
//!
//! ```text
//! +------------------------+
//! | Version                | (u16 BE, = 1)
//! +------------------------+
//! | Page Number            | (u32 BE)
//! +------------------------+
//! | First Unacked Page Num | (u32 BE)
//! +------------------------+
//! | First Unacked Seq Num  | (u64 BE)
//! +------------------------+
//! | Min Seq Num            | (u64 BE)
//! +------------------------+
//! | Element Count          | (u32 BE)
//! +------------------------+
//! | Last Seq Num           | (u64 BE, highest number assigned so far)
//! +------------------------+
//! | Checksum               | (u32 BE, CRC32 of the 38 bytes above)
//! +------------------------+
//! ```

use crc32fast::Hasher;
use serde::Serialize;

use super::errors::{CheckpointError, CheckpointResult};

/// Checkpoint format version
pub const CHECKPOINT_VERSION: u16 = 1;

/// Encoded size of a checkpoint in bytes
pub const CHECKPOINT_SIZE: usize = 2 + 4 + 4 + 8 + 8 + 4 + 8 + 4;

const BODY_SIZE: usize = CHECKPOINT_SIZE - 4;

/// Last durably known state of one page.
///
/// Always satisfies `min_seq_num <= first_unacked_seq_num <= min_seq_num + element_count`;
/// [`Checkpoint::new`] refuses anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Checkpoint {
    page_num: u32,
    first_unacked_page_num: u32,
    first_unacked_seq_num: u64,
    min_seq_num: u64,
    element_count: u32,
    /// High-water mark of assigned sequence numbers, kept across purges
    last_seq_num: u64,
}

impl Checkpoint {
    /// Builds a checkpoint, validating the acknowledged range.
    pub fn new(
        page_num: u32,
        first_unacked_page_num: u32,
        first_unacked_seq_num: u64,
        min_seq_num: u64,
        element_count: u32,
    ) -> CheckpointResult<Self> {
        let end = min_seq_num.checked_add(element_count as u64);
        let in_range = first_unacked_seq_num >= min_seq_num
            && end.is_some_and(|end| first_unacked_seq_num <= end);
        if !in_range {
            return Err(CheckpointError::InvalidRange {
                min_seq_num,
                element_count,
                first_unacked_seq_num,
            });
        }

        Ok(Self {
            page_num,
            first_unacked_page_num,
            first_unacked_seq_num,
            min_seq_num,
            element_count,
            last_seq_num: 0,
        })
    }

    /// Snapshot of a live page, whose acknowledgment state keeps the range valid.
    pub(crate) fn from_page_state(
        page_num: u32,
        first_unacked_page_num: u32,
        first_unacked_seq_num: u64,
        min_seq_num: u64,
        element_count: u32,
    ) -> Self {
        debug_assert!(
            first_unacked_seq_num >= min_seq_num
                && first_unacked_seq_num <= min_seq_num + element_count as u64
        );
        Self {
            page_num,
            first_unacked_page_num,
            first_unacked_seq_num,
            min_seq_num,
            element_count,
            last_seq_num: 0,
        }
    }

    /// Checkpoint of a page that has never held an element
    pub fn empty(page_num: u32, first_unacked_page_num: u32) -> Self {
        Self {
            page_num,
            first_unacked_page_num,
            first_unacked_seq_num: 0,
            min_seq_num: 0,
            element_count: 0,
            last_seq_num: 0,
        }
    }

    /// Records the highest sequence number assigned by the queue.
    pub fn with_last_seq_num(mut self, last_seq_num: u64) -> Self {
        self.last_seq_num = last_seq_num;
        self
    }

    pub fn page_num(&self) -> u32 {
        self.page_num
    }

    /// Oldest page still holding unacknowledged elements (head checkpoint only)
    pub fn first_unacked_page_num(&self) -> u32 {
        self.first_unacked_page_num
    }

    pub fn first_unacked_seq_num(&self) -> u64 {
        self.first_unacked_seq_num
    }

    pub fn min_seq_num(&self) -> u64 {
        self.min_seq_num
    }

    pub fn element_count(&self) -> u32 {
        self.element_count
    }

    /// Highest sequence number known to have been assigned, at least the
    /// last one this page holds
    pub fn last_seq_num(&self) -> u64 {
        let held = match self.element_count {
            0 => 0,
            n => self.min_seq_num + n as u64 - 1,
        };
        self.last_seq_num.max(held)
    }

    /// Length of the durably acknowledged prefix
    pub fn acked_prefix_len(&self) -> u64 {
        self.first_unacked_seq_num.saturating_sub(self.min_seq_num)
    }

    /// Returns true if the page held elements and all of them are acknowledged
    pub fn is_fully_acked(&self) -> bool {
        self.element_count > 0 && self.acked_prefix_len() == self.element_count as u64
    }

    /// Encodes the checkpoint with its trailing checksum.
    pub fn to_bytes(&self) -> [u8; CHECKPOINT_SIZE] {
        let mut buf = [0u8; CHECKPOINT_SIZE];
        buf[0..2].copy_from_slice(&CHECKPOINT_VERSION.to_be_bytes());
        buf[2..6].copy_from_slice(&self.page_num.to_be_bytes());
        buf[6..10].copy_from_slice(&self.first_unacked_page_num.to_be_bytes());
        buf[10..18].copy_from_slice(&self.first_unacked_seq_num.to_be_bytes());
        buf[18..26].copy_from_slice(&self.min_seq_num.to_be_bytes());
        buf[26..30].copy_from_slice(&self.element_count.to_be_bytes());
        buf[30..38].copy_from_slice(&self.last_seq_num.to_be_bytes());
        let checksum = compute_checksum(&buf[..BODY_SIZE]);
        buf[BODY_SIZE..].copy_from_slice(&checksum.to_be_bytes());
        buf
    }

    /// Decodes a checkpoint read from the file `name`, verifying length,
    /// version, checksum and range.
    pub fn from_bytes(name: &str, bytes: &[u8]) -> CheckpointResult<Self> {
        if bytes.len() != CHECKPOINT_SIZE {
            return Err(CheckpointError::Corrupted {
                name: name.to_string(),
                reason: format!("expected {} bytes, found {}", CHECKPOINT_SIZE, bytes.len()),
            });
        }

        let stored = u32::from_be_bytes(be(bytes, BODY_SIZE));
        let computed = compute_checksum(&bytes[..BODY_SIZE]);
        if stored != computed {
            return Err(CheckpointError::Corrupted {
                name: name.to_string(),
                reason: format!(
                    "checksum mismatch: stored {:#010x}, computed {:#010x}",
                    stored, computed
                ),
            });
        }

        let version = u16::from_be_bytes(be(bytes, 0));
        if version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                name: name.to_string(),
                version,
            });
        }

        let checkpoint = Self::new(
            u32::from_be_bytes(be(bytes, 2)),
            u32::from_be_bytes(be(bytes, 6)),
            u64::from_be_bytes(be(bytes, 10)),
            u64::from_be_bytes(be(bytes, 18)),
            u32::from_be_bytes(be(bytes, 26)),
        )?;
        Ok(checkpoint.with_last_seq_num(u64::from_be_bytes(be(bytes, 30))))
    }
}

fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

fn be<const N: usize>(bytes: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[at..at + N]);
    out
}
