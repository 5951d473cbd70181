//! Queue pages
//!
//! A page is a bounded run of consecutively numbered elements together with
//! its acknowledgment state. The queue holds exactly one head page, open for
//! appends, and any number of sealed tail pages that are only read and
//! acknowledged.
//!
//! Pages are only ever built through [`PageLifecycle`]. Construction either
//! returns a fully usable page or fails having released the storage handle;
//! there is no half-open page.
//!
//! # Acknowledgment durability
//!
//! Only the contiguous acknowledged prefix reaches a checkpoint, through
//! `first_unacked_seq_num`. Acks beyond the first gap are kept in memory and
//! are lost on a crash, so those elements are delivered again.

mod errors;
mod guard;
mod lifecycle;

#[cfg(test)]
pub(crate) mod mock;

pub use errors::{PageError, PageErrorCode, PageResult, Severity};
pub use lifecycle::PageLifecycle;

use serde::Serialize;

use crate::ack::AckBitmap;
use crate::checkpoint::Checkpoint;
use crate::observability::{log_event, Event};
use crate::page_io::{Element, PageIo};

/// Point-in-time summary of a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageStatus {
    pub page_num: u32,
    pub is_head: bool,
    pub min_seq_num: u64,
    pub element_count: u32,
    pub first_unacked_seq_num: u64,
    pub first_unread_seq_num: u64,
    pub acked_count: usize,
}

/// Runtime representation of one queue page
pub struct Page<P: PageIo> {
    page_num: u32,
    min_seq_num: u64,
    element_count: u32,
    first_unread_seq_num: u64,
    acked: AckBitmap,
    io: P,
    is_head: bool,
    released: bool,
}

impl<P: PageIo> Page<P> {
    pub(crate) fn assemble(
        page_num: u32,
        min_seq_num: u64,
        element_count: u32,
        first_unread_seq_num: u64,
        acked: AckBitmap,
        io: P,
        is_head: bool,
    ) -> Self {
        Self {
            page_num,
            min_seq_num,
            element_count,
            first_unread_seq_num,
            acked,
            io,
            is_head,
            released: false,
        }
    }

    pub fn page_num(&self) -> u32 {
        self.page_num
    }

    pub fn min_seq_num(&self) -> u64 {
        self.min_seq_num
    }

    pub fn element_count(&self) -> u32 {
        self.element_count
    }

    pub fn is_head(&self) -> bool {
        self.is_head
    }

    pub fn is_empty(&self) -> bool {
        self.element_count == 0
    }

    /// Acknowledgment set, indexed by `seq_num - min_seq_num`
    pub fn acked(&self) -> &AckBitmap {
        &self.acked
    }

    /// Highest sequence number in the page, `None` when empty
    pub fn max_seq_num(&self) -> Option<u64> {
        if self.is_empty() {
            None
        } else {
            Some(self.min_seq_num + self.element_count as u64 - 1)
        }
    }

    /// Returns true if `seq_num` is stored in this page
    pub fn contains(&self, seq_num: u64) -> bool {
        match self.max_seq_num() {
            Some(max) => seq_num >= self.min_seq_num && seq_num <= max,
            None => false,
        }
    }

    /// First sequence number not covered by the acknowledged prefix
    pub fn first_unacked_seq_num(&self) -> u64 {
        self.min_seq_num + self.acked.next_clear(0) as u64
    }

    /// Next sequence number `read` hands out
    pub fn first_unread_seq_num(&self) -> u64 {
        self.first_unread_seq_num
    }

    pub fn acked_count(&self) -> usize {
        self.acked.count_ones()
    }

    pub fn is_acked(&self, seq_num: u64) -> bool {
        self.contains(seq_num) && self.acked.is_set((seq_num - self.min_seq_num) as usize)
    }

    /// Returns true if the page holds elements and every one is acknowledged
    pub fn is_fully_acked(&self) -> bool {
        !self.is_empty() && self.acked_count() == self.element_count as usize
    }

    pub fn unread_count(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        (self.min_seq_num + self.element_count as u64).saturating_sub(self.first_unread_seq_num)
    }

    pub fn is_fully_read(&self) -> bool {
        self.unread_count() == 0
    }

    /// Returns true if an element of `bytes` bytes still fits in the page
    pub fn has_space(&self, bytes: usize) -> bool {
        self.io.has_space(bytes)
    }

    /// Appends an element. Head page only.
    pub fn write(&mut self, data: &[u8], seq_num: u64) -> PageResult<()> {
        if !self.is_head {
            return Err(PageError::not_head(self.page_num, "write"));
        }
        self.io
            .write(data, seq_num)
            .map_err(|e| PageError::io(self.page_num, "failed to append element", e))?;

        if self.is_empty() {
            self.min_seq_num = seq_num;
            self.first_unread_seq_num = seq_num;
        }
        self.element_count += 1;
        Ok(())
    }

    /// Hands out up to `limit` unread elements, advancing the read position.
    pub fn read(&mut self, limit: usize) -> PageResult<Vec<Element>> {
        let available = self.unread_count().min(limit as u64) as usize;
        if available == 0 {
            return Ok(Vec::new());
        }

        let elements = self
            .io
            .read(self.first_unread_seq_num, available)
            .map_err(|e| PageError::io(self.page_num, "failed to read elements", e))?;
        self.first_unread_seq_num += elements.len() as u64;
        Ok(elements)
    }

    /// Acknowledges `seq_num`. Returns false if it was already acknowledged.
    pub fn ack(&mut self, seq_num: u64) -> PageResult<bool> {
        if !self.contains(seq_num) {
            return Err(PageError::sequence_out_of_range(
                self.page_num,
                seq_num,
                self.min_seq_num,
                self.element_count,
            ));
        }
        Ok(self.acked.set((seq_num - self.min_seq_num) as usize))
    }

    /// Snapshot of the page's recovery state
    pub fn to_checkpoint(&self, first_unacked_page_num: u32) -> Checkpoint {
        Checkpoint::from_page_state(
            self.page_num,
            first_unacked_page_num,
            self.first_unacked_seq_num(),
            self.min_seq_num,
            self.element_count,
        )
    }

    /// Forces appended elements to durable storage
    pub fn ensure_persisted(&mut self) -> PageResult<()> {
        self.io
            .ensure_persisted()
            .map_err(|e| PageError::io(self.page_num, "failed to persist page", e))
    }

    /// Seals the head page into a tail page once its elements are durable.
    pub fn behead(&mut self) -> PageResult<()> {
        if !self.is_head {
            return Err(PageError::not_head(self.page_num, "behead"));
        }
        self.ensure_persisted()?;
        self.is_head = false;
        log_event(
            Event::PageBeheaded,
            &[
                ("page_num", &self.page_num.to_string()),
                ("element_count", &self.element_count.to_string()),
            ],
        );
        Ok(())
    }

    /// Releases the storage handle. Later calls do nothing.
    pub fn close(&mut self) -> PageResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.io
            .release()
            .map_err(|e| PageError::io(self.page_num, "failed to release page storage", e))
    }

    /// Deletes the page's durable bytes.
    pub fn purge(mut self) -> PageResult<()> {
        self.released = true;
        self.io
            .purge()
            .map_err(|e| PageError::io(self.page_num, "failed to purge page", e))?;
        log_event(Event::PagePurged, &[("page_num", &self.page_num.to_string())]);
        Ok(())
    }

    pub fn status(&self) -> PageStatus {
        PageStatus {
            page_num: self.page_num,
            is_head: self.is_head,
            min_seq_num: self.min_seq_num,
            element_count: self.element_count,
            first_unacked_seq_num: self.first_unacked_seq_num(),
            first_unread_seq_num: self.first_unread_seq_num,
            acked_count: self.acked_count(),
        }
    }
}

impl<P: PageIo> Drop for Page<P> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.io.release() {
            log_event(
                Event::StorageReleaseFailed,
                &[
                    ("page_num", &self.page_num.to_string()),
                    ("reason", &e.to_string()),
                ],
            );
        }
    }
}

impl<P: PageIo> std::fmt::Debug for Page<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("page_num", &self.page_num)
            .field("is_head", &self.is_head)
            .field("min_seq_num", &self.min_seq_num)
            .field("element_count", &self.element_count)
            .field("first_unacked_seq_num", &self.first_unacked_seq_num())
            .field("first_unread_seq_num", &self.first_unread_seq_num)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockPageIo;
    use super::*;

    fn fresh_head(page_num: u32) -> Page<MockPageIo> {
        PageLifecycle::create_fresh_head(page_num, MockPageIo::empty(page_num))
    }

    fn head_with(page_num: u32, first_seq: u64, count: u64) -> Page<MockPageIo> {
        let mut page = fresh_head(page_num);
        for seq in first_seq..first_seq + count {
            page.write(&seq.to_be_bytes(), seq).unwrap();
        }
        page
    }

    #[test]
    fn test_first_write_sets_min_seq_num() {
        let mut page = fresh_head(0);
        assert!(page.is_empty());
        assert_eq!(page.max_seq_num(), None);

        page.write(b"a", 7).unwrap();
        assert_eq!(page.min_seq_num(), 7);
        assert_eq!(page.element_count(), 1);
        assert_eq!(page.first_unread_seq_num(), 7);
        assert_eq!(page.first_unacked_seq_num(), 7);
        assert_eq!(page.max_seq_num(), Some(7));
    }

    #[test]
    fn test_read_advances_position() {
        let mut page = head_with(0, 1, 5);

        let first = page.read(2).unwrap();
        assert_eq!(first.iter().map(|e| e.seq_num).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(page.unread_count(), 3);

        let rest = page.read(10).unwrap();
        assert_eq!(rest.len(), 3);
        assert!(page.is_fully_read());
        assert!(page.read(10).unwrap().is_empty());
    }

    #[test]
    fn test_ack_tracks_prefix_and_sparse() {
        let mut page = head_with(0, 10, 5);

        assert!(page.ack(10).unwrap());
        assert!(page.ack(12).unwrap());
        assert!(!page.ack(12).unwrap());
        assert_eq!(page.acked_count(), 2);
        assert_eq!(page.first_unacked_seq_num(), 11);
        assert!(page.is_acked(12));
        assert!(!page.is_acked(11));

        page.ack(11).unwrap();
        assert_eq!(page.first_unacked_seq_num(), 13);
    }

    #[test]
    fn test_ack_out_of_range() {
        let mut page = head_with(0, 10, 5);
        let err = page.ack(15).unwrap_err();
        assert_eq!(err.code(), PageErrorCode::SequenceOutOfRange);
        assert!(page.ack(9).is_err());
        assert!(fresh_head(1).ack(0).is_err());
    }

    #[test]
    fn test_fully_acked() {
        let mut page = head_with(0, 1, 3);
        assert!(!page.is_fully_acked());
        for seq in 1..=3 {
            page.ack(seq).unwrap();
        }
        assert!(page.is_fully_acked());
        assert_eq!(page.first_unacked_seq_num(), 4);
        assert!(!fresh_head(1).is_fully_acked());
    }

    #[test]
    fn test_checkpoint_records_prefix_only() {
        let mut page = head_with(2, 100, 10);
        for seq in [100, 101, 102, 105, 106] {
            page.ack(seq).unwrap();
        }

        let cp = page.to_checkpoint(1);
        assert_eq!(cp.page_num(), 2);
        assert_eq!(cp.first_unacked_page_num(), 1);
        assert_eq!(cp.min_seq_num(), 100);
        assert_eq!(cp.element_count(), 10);
        assert_eq!(cp.first_unacked_seq_num(), 103);
    }

    #[test]
    fn test_full_page_rejects_write() {
        let io = MockPageIo::empty(0).with_capacity(2);
        let mut page = PageLifecycle::create_fresh_head(0, io);
        page.write(b"ab", 1).unwrap();
        assert!(!page.has_space(1));

        let err = page.write(b"c", 2).unwrap_err();
        assert_eq!(err.code(), PageErrorCode::PageFull);
        assert_eq!(page.element_count(), 1);
    }

    #[test]
    fn test_behead_seals_page() {
        let mut page = head_with(0, 1, 2);
        page.behead().unwrap();
        assert!(!page.is_head());

        let err = page.write(b"x", 3).unwrap_err();
        assert_eq!(err.code(), PageErrorCode::NotHead);
        assert_eq!(page.behead().unwrap_err().code(), PageErrorCode::NotHead);
    }

    #[test]
    fn test_close_releases_once() {
        let io = MockPageIo::empty(0);
        let releases = io.release_counter();
        let mut page = PageLifecycle::create_fresh_head(0, io);

        page.close().unwrap();
        page.close().unwrap();
        drop(page);
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn test_drop_releases_unclosed_page() {
        let io = MockPageIo::empty(0);
        let releases = io.release_counter();
        drop(PageLifecycle::create_fresh_head(0, io));
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn test_purge_does_not_release() {
        let io = MockPageIo::empty(0);
        let releases = io.release_counter();
        let page = PageLifecycle::create_fresh_head(0, io);
        page.purge().unwrap();
        assert_eq!(releases.get(), 0);
    }

    #[test]
    fn test_status() {
        let mut page = head_with(4, 20, 3);
        page.ack(20).unwrap();
        page.read(1).unwrap();

        let status = page.status();
        assert_eq!(status.page_num, 4);
        assert!(status.is_head);
        assert_eq!(status.first_unacked_seq_num, 21);
        assert_eq!(status.first_unread_seq_num, 21);
        assert_eq!(status.acked_count, 1);
    }
}
