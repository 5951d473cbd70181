//! Page construction
//!
//! Three ways to materialize a page:
//!
//! - [`PageLifecycle::create_fresh_head`]: brand new, empty head page
//! - [`PageLifecycle::recover_head`]: head page rebuilt from its checkpoint,
//!   after verifying the checkpoint against what the page file holds
//! - [`PageLifecycle::recover_tail`]: tail page rebuilt from its checkpoint,
//!   trusting the checkpoint without comparing it to the page file
//!
//! Recovery rebuilds only the contiguous acknowledged prefix recorded in the
//! checkpoint. Every element at or beyond `first_unacked_seq_num` comes back
//! unacknowledged and unread.
//!
//! Both recover operations take ownership of the storage handle. On failure
//! the handle has been released exactly once and no page exists.

use crate::ack::AckBitmap;
use crate::checkpoint::Checkpoint;
use crate::observability::{log_event, Event};
use crate::page_io::PageIo;

use super::errors::{PageError, PageResult};
use super::guard::ReleaseGuard;
use super::Page;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Head,
    Tail,
}

/// Constructors for queue pages
pub struct PageLifecycle;

impl PageLifecycle {
    /// Builds an empty head page over a newly created storage handle.
    pub fn create_fresh_head<P: PageIo>(page_num: u32, storage: P) -> Page<P> {
        log_event(Event::HeadPageCreated, &[("page_num", &page_num.to_string())]);
        Page::assemble(page_num, 0, 0, 0, AckBitmap::new(), storage, true)
    }

    /// Rebuilds the head page from its checkpoint.
    ///
    /// Fails with `RecoveryInconsistency` when the checkpoint's `min_seq_num`
    /// or `element_count` differs from the storage handle's.
    pub fn recover_head<P: PageIo>(checkpoint: &Checkpoint, storage: P) -> PageResult<Page<P>> {
        Self::recover(checkpoint, storage, Role::Head)
    }

    /// Rebuilds a tail page from its checkpoint.
    ///
    /// Unlike [`recover_head`](Self::recover_head) the checkpoint is not
    /// compared with the storage handle.
    pub fn recover_tail<P: PageIo>(checkpoint: &Checkpoint, storage: P) -> PageResult<Page<P>> {
        Self::recover(checkpoint, storage, Role::Tail)
    }

    fn recover<P: PageIo>(checkpoint: &Checkpoint, storage: P, role: Role) -> PageResult<Page<P>> {
        let page_num = checkpoint.page_num();
        let mut guard = ReleaseGuard::new(storage);

        if let Err(e) = guard.get_mut().activate() {
            log_event(
                Event::ResourceAcquisitionFailed,
                &[("page_num", &page_num.to_string()), ("reason", &e.to_string())],
            );
            return Err(PageError::resource_acquisition(page_num, e));
        }

        if role == Role::Head {
            verify_storage_matches(checkpoint, guard.get())?;
        }

        let acked = AckBitmap::with_prefix(checkpoint.acked_prefix_len() as usize);
        let page = Page::assemble(
            page_num,
            checkpoint.min_seq_num(),
            checkpoint.element_count(),
            checkpoint.first_unacked_seq_num(),
            acked,
            guard.disarm(),
            role == Role::Head,
        );

        let event = match role {
            Role::Head => Event::HeadPageRecovered,
            Role::Tail => Event::TailPageRecovered,
        };
        log_event(
            event,
            &[
                ("page_num", &page_num.to_string()),
                ("min_seq_num", &checkpoint.min_seq_num().to_string()),
                ("element_count", &checkpoint.element_count().to_string()),
                ("first_unacked_seq_num", &checkpoint.first_unacked_seq_num().to_string()),
            ],
        );
        Ok(page)
    }
}

fn verify_storage_matches<P: PageIo>(checkpoint: &Checkpoint, storage: &P) -> PageResult<()> {
    let storage_min = storage.min_seq_num();
    let storage_count = storage.element_count();
    if checkpoint.min_seq_num() == storage_min && checkpoint.element_count() == storage_count {
        return Ok(());
    }

    log_event(
        Event::RecoveryInconsistency,
        &[
            ("page_num", &checkpoint.page_num().to_string()),
            ("checkpoint_min_seq_num", &checkpoint.min_seq_num().to_string()),
            ("checkpoint_element_count", &checkpoint.element_count().to_string()),
            ("storage_min_seq_num", &storage_min.to_string()),
            ("storage_element_count", &storage_count.to_string()),
        ],
    );
    Err(PageError::recovery_inconsistency(checkpoint, storage_min, storage_count))
}

#[cfg(test)]
mod tests {
    use super::super::mock::MockPageIo;
    use super::super::PageErrorCode;
    use super::*;

    fn checkpoint(first_unacked: u64, min: u64, count: u32) -> Checkpoint {
        Checkpoint::new(3, 3, first_unacked, min, count).unwrap()
    }

    #[test]
    fn test_fresh_head_is_empty() {
        let page = PageLifecycle::create_fresh_head(5, MockPageIo::empty(5));
        assert_eq!(page.page_num(), 5);
        assert_eq!(page.element_count(), 0);
        assert_eq!(page.min_seq_num(), 0);
        assert_eq!(page.first_unacked_seq_num(), 0);
        assert!(page.acked().is_empty());
        assert!(page.is_head());
    }

    #[test]
    fn test_recover_head_nothing_acked() {
        let page =
            PageLifecycle::recover_head(&checkpoint(100, 100, 10), MockPageIo::holding(3, 100, 10))
                .unwrap();

        assert!(page.is_head());
        assert_eq!(page.acked_count(), 0);
        assert_eq!(page.first_unacked_seq_num(), 100);
        assert_eq!(page.first_unread_seq_num(), 100);
        assert_eq!(page.unread_count(), 10);
    }

    #[test]
    fn test_recover_head_rebuilds_acked_prefix() {
        let page =
            PageLifecycle::recover_head(&checkpoint(105, 100, 10), MockPageIo::holding(3, 100, 10))
                .unwrap();

        for offset in 0..5 {
            assert!(page.acked().is_set(offset));
        }
        for offset in 5..10 {
            assert!(!page.acked().is_set(offset));
        }
        assert_eq!(page.acked_count(), 5);
        assert_eq!(page.first_unacked_seq_num(), 105);
        assert_eq!(page.first_unread_seq_num(), 105);
    }

    #[test]
    fn test_recover_head_fully_acked() {
        let page =
            PageLifecycle::recover_head(&checkpoint(110, 100, 10), MockPageIo::holding(3, 100, 10))
                .unwrap();
        assert!(page.is_fully_acked());
        assert!(page.is_fully_read());
    }

    #[test]
    fn test_recover_head_count_mismatch_is_fatal() {
        let storage = MockPageIo::holding(3, 100, 9);
        let releases = storage.release_counter();

        let err = PageLifecycle::recover_head(&checkpoint(100, 100, 10), storage).unwrap_err();
        assert_eq!(err.code(), PageErrorCode::RecoveryInconsistency);
        assert!(err.is_fatal());
        assert_eq!(err.page_num(), 3);
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn test_recover_head_min_mismatch_is_fatal() {
        let storage = MockPageIo::holding(3, 101, 10);
        let releases = storage.release_counter();

        let err = PageLifecycle::recover_head(&checkpoint(101, 100, 10), storage).unwrap_err();
        assert_eq!(err.code(), PageErrorCode::RecoveryInconsistency);
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn test_recover_tail_trusts_checkpoint() {
        let storage = MockPageIo::holding(3, 100, 9);
        let releases = storage.release_counter();

        let page = PageLifecycle::recover_tail(&checkpoint(105, 100, 10), storage).unwrap();
        assert!(!page.is_head());
        assert_eq!(page.element_count(), 10);
        assert_eq!(page.min_seq_num(), 100);
        assert_eq!(page.acked_count(), 5);
        assert_eq!(releases.get(), 0);
    }

    #[test]
    fn test_recover_head_and_tail_differ_only_in_cross_check() {
        let cp = checkpoint(100, 100, 10);
        assert!(PageLifecycle::recover_tail(&cp, MockPageIo::holding(3, 50, 2)).is_ok());
        assert!(PageLifecycle::recover_head(&cp, MockPageIo::holding(3, 50, 2)).is_err());
    }

    #[test]
    fn test_attach_failure_releases_once() {
        for head in [true, false] {
            let storage = MockPageIo::holding(3, 100, 10).failing_activate();
            let releases = storage.release_counter();
            let cp = checkpoint(100, 100, 10);

            let err = if head {
                PageLifecycle::recover_head(&cp, storage).unwrap_err()
            } else {
                PageLifecycle::recover_tail(&cp, storage).unwrap_err()
            };
            assert_eq!(err.code(), PageErrorCode::ResourceAcquisitionFailure);
            assert!(err.io_source().is_some());
            assert_eq!(releases.get(), 1);
        }
    }

    #[test]
    fn test_release_failure_keeps_original_error() {
        let storage = MockPageIo::holding(3, 100, 9).failing_release();
        let releases = storage.release_counter();

        let err = PageLifecycle::recover_head(&checkpoint(100, 100, 10), storage).unwrap_err();
        assert_eq!(err.code(), PageErrorCode::RecoveryInconsistency);
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn test_recovered_page_releases_on_close_only() {
        let storage = MockPageIo::holding(3, 100, 10);
        let releases = storage.release_counter();

        let mut page = PageLifecycle::recover_head(&checkpoint(100, 100, 10), storage).unwrap();
        assert_eq!(releases.get(), 0);
        page.close().unwrap();
        drop(page);
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn test_recovered_head_accepts_writes() {
        let mut page =
            PageLifecycle::recover_head(&checkpoint(102, 100, 3), MockPageIo::holding(3, 100, 3))
                .unwrap();
        page.write(b"next", 103).unwrap();
        assert_eq!(page.element_count(), 4);
        assert_eq!(page.min_seq_num(), 100);
        assert_eq!(page.max_seq_num(), Some(103));
    }
}
