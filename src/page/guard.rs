//! Scoped ownership of a storage handle during page construction
//!
//! The guard owns the handle until construction succeeds and the handle is
//! moved into the page. Any early return drops the guard, which releases the
//! handle exactly once. A release failure is logged; it never replaces the
//! error that caused the early return.

use crate::observability::{log_event, Event};
use crate::page_io::PageIo;

pub(crate) struct ReleaseGuard<P: PageIo> {
    io: Option<P>,
}

impl<P: PageIo> ReleaseGuard<P> {
    pub(crate) fn new(io: P) -> Self {
        Self { io: Some(io) }
    }

    pub(crate) fn get(&self) -> &P {
        // Only `disarm` empties the guard, and it consumes it.
        self.io.as_ref().unwrap_or_else(|| unreachable!("guard emptied before disarm"))
    }

    pub(crate) fn get_mut(&mut self) -> &mut P {
        self.io.as_mut().unwrap_or_else(|| unreachable!("guard emptied before disarm"))
    }

    /// Hands the handle over to its new owner without releasing it.
    pub(crate) fn disarm(mut self) -> P {
        self.io.take().unwrap_or_else(|| unreachable!("guard emptied before disarm"))
    }
}

impl<P: PageIo> Drop for ReleaseGuard<P> {
    fn drop(&mut self) {
        if let Some(mut io) = self.io.take() {
            if let Err(e) = io.release() {
                log_event(
                    Event::StorageReleaseFailed,
                    &[
                        ("page_num", &io.page_num().to_string()),
                        ("reason", &e.to_string()),
                    ],
                );
            }
        }
    }
}
