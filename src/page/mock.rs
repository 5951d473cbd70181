//! In-memory storage handle for page tests

use std::cell::Cell;
use std::rc::Rc;

use crate::page_io::{Element, PageIo, PageIoError, PageIoResult};

pub(crate) struct MockPageIo {
    page_num: u32,
    elements: Vec<Element>,
    capacity: usize,
    used: usize,
    released: bool,
    fail_activate: bool,
    fail_release: bool,
    releases: Rc<Cell<u32>>,
}

impl MockPageIo {
    pub(crate) fn empty(page_num: u32) -> Self {
        Self {
            page_num,
            elements: Vec::new(),
            capacity: 1024,
            used: 0,
            released: false,
            fail_activate: false,
            fail_release: false,
            releases: Rc::new(Cell::new(0)),
        }
    }

    /// Storage already holding `count` elements starting at `min_seq_num`.
    pub(crate) fn holding(page_num: u32, min_seq_num: u64, count: u32) -> Self {
        let mut io = Self::empty(page_num);
        for seq_num in min_seq_num..min_seq_num + count as u64 {
            io.elements.push(Element {
                seq_num,
                data: seq_num.to_be_bytes().to_vec(),
            });
        }
        io.used = count as usize * 8;
        io
    }

    pub(crate) fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub(crate) fn failing_activate(mut self) -> Self {
        self.fail_activate = true;
        self
    }

    pub(crate) fn failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    /// Counter of `release` calls, shared with the handle.
    pub(crate) fn release_counter(&self) -> Rc<Cell<u32>> {
        Rc::clone(&self.releases)
    }
}

impl PageIo for MockPageIo {
    fn page_num(&self) -> u32 {
        self.page_num
    }

    fn min_seq_num(&self) -> u64 {
        self.elements.first().map_or(0, |e| e.seq_num)
    }

    fn element_count(&self) -> u32 {
        self.elements.len() as u32
    }

    fn has_space(&self, bytes: usize) -> bool {
        self.used + bytes <= self.capacity
    }

    fn write(&mut self, data: &[u8], seq_num: u64) -> PageIoResult<()> {
        if !self.has_space(data.len()) {
            return Err(PageIoError::NoSpace {
                page_num: self.page_num,
                needed: data.len(),
                remaining: self.capacity - self.used,
            });
        }
        if let Some(last) = self.elements.last() {
            if seq_num != last.seq_num + 1 {
                return Err(PageIoError::NonContiguousSequence {
                    page_num: self.page_num,
                    expected: last.seq_num + 1,
                    actual: seq_num,
                });
            }
        }
        self.used += data.len();
        self.elements.push(Element {
            seq_num,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn read(&mut self, seq_num: u64, limit: usize) -> PageIoResult<Vec<Element>> {
        let start = (seq_num - self.min_seq_num()) as usize;
        Ok(self.elements.iter().skip(start).take(limit).cloned().collect())
    }

    fn activate(&mut self) -> PageIoResult<()> {
        if self.fail_activate {
            return Err(PageIoError::Inactive {
                page_num: self.page_num,
            });
        }
        Ok(())
    }

    fn ensure_persisted(&mut self) -> PageIoResult<()> {
        Ok(())
    }

    fn release(&mut self) -> PageIoResult<()> {
        self.releases.set(self.releases.get() + 1);
        if self.released {
            return Err(PageIoError::Released {
                page_num: self.page_num,
            });
        }
        self.released = true;
        if self.fail_release {
            return Err(PageIoError::Inactive {
                page_num: self.page_num,
            });
        }
        Ok(())
    }

    fn purge(&mut self) -> PageIoResult<()> {
        self.released = true;
        self.elements.clear();
        Ok(())
    }
}
