//! Read batches and queue status reports

use std::path::PathBuf;

use serde::Serialize;

use crate::page::PageStatus;
use crate::page_io::Element;

/// Elements handed out by one `read_batch` call, in sequence order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    elements: Vec<Element>,
}

impl Batch {
    pub(crate) fn new(elements: Vec<Element>) -> Self {
        Self { elements }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Sequence numbers to pass back to `Queue::ack`
    pub fn seq_nums(&self) -> Vec<u64> {
        self.elements.iter().map(|e| e.seq_num).collect()
    }

    pub fn into_elements(self) -> Vec<Element> {
        self.elements
    }
}

/// Snapshot of the queue's pages
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub dir: PathBuf,
    /// Last sequence number handed to a producer
    pub seq_num: u64,
    pub head_page_num: u32,
    pub first_unacked_page_num: u32,
    pub unacked_count: u64,
    pub unread_count: u64,
    /// Tail pages oldest first, then the head page
    pub pages: Vec<PageStatus>,
}
