//! Durable acknowledged FIFO queue
//!
//! The queue owns one head page and the tail pages that still hold
//! unacknowledged elements, all stored in a single directory:
//!
//! - `page.<n>`: page data files
//! - `checkpoint.head`: checkpoint of the head page
//! - `checkpoint.<n>`: checkpoint of tail page `n`
//!
//! # Open sequence
//!
//! 1. No head checkpoint: create page 0 as a fresh head and checkpoint it
//! 2. Otherwise recover every tail from `first_unacked_page_num` up to the
//!    head, purging tails whose checkpoint is fully acknowledged
//! 3. Delete page files below the head that no checkpoint refers to, left
//!    behind by a crash between checkpoint and page deletion
//! 4. Reopen the head page file and recover the head from its checkpoint
//! 5. A non-empty recovered head is sealed into a tail and a fresh head takes
//!    its place ([`Queue::inspect`] skips this step)
//!
//! Recovered pages redeliver everything from their first unacknowledged
//! element, so a crash may cause redelivery but never loss.
//!
//! Every head checkpoint carries the highest sequence number assigned so
//! far, so numbering continues after every page holding it was purged.

mod config;
mod errors;
mod status;

pub use config::QueueConfig;
pub use errors::{QueueError, QueueResult};
pub use status::{Batch, QueueStatus};

use std::fs;
use std::io;
use std::mem;
use std::path::Path;

use crate::checkpoint::{Checkpoint, CheckpointIo, FileCheckpointIo};
use crate::crash_point::{maybe_crash, points};
use crate::observability::{log_event, Event, ObservationScope};
use crate::page::{Page, PageLifecycle};
use crate::page_io::{page_file_name, FilePageIo, PageIo};

type FilePage = Page<FilePageIo>;

/// What open does with a recovered head page that holds elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeadMode {
    /// Seal it into a tail and start a fresh head
    Seal,
    /// Keep appending to it
    Keep,
}

/// Durable FIFO queue with per-element acknowledgment
#[derive(Debug)]
pub struct Queue {
    config: QueueConfig,
    checkpoints: FileCheckpointIo,
    /// Sealed pages, oldest first
    tails: Vec<FilePage>,
    head: FilePage,
    /// Last assigned sequence number
    seq_num: u64,
    writes_since_checkpoint: u32,
    closed: bool,
}

impl Queue {
    /// Opens the queue in `config.dir`, creating it on first use.
    ///
    /// Any checkpoint that disagrees with its head page file halts the open
    /// with a fatal error.
    pub fn open(config: QueueConfig) -> QueueResult<Self> {
        Self::open_with(config, HeadMode::Seal)
    }

    /// Recovers the queue, reports its status and closes it again.
    ///
    /// Unlike [`Queue::open`] the head page is not sealed, so no page file
    /// is created. Crash leftovers are still cleaned up.
    pub fn inspect(config: QueueConfig) -> QueueResult<QueueStatus> {
        let mut queue = Self::open_with(config, HeadMode::Keep)?;
        let status = queue.status();
        queue.close()?;
        Ok(status)
    }

    fn open_with(config: QueueConfig, mode: HeadMode) -> QueueResult<Self> {
        config.validate()?;
        let dir = config.dir.display().to_string();
        let scope = ObservationScope::with_fields("QUEUE_OPEN", &[("dir", &dir)]);

        match Self::open_pages(config, mode) {
            Ok(queue) => {
                scope.complete(&[
                    ("head_page_num", &queue.head.page_num().to_string()),
                    ("tail_pages", &queue.tails.len().to_string()),
                    ("seq_num", &queue.seq_num.to_string()),
                ]);
                Ok(queue)
            }
            Err(e) => {
                if e.is_fatal() {
                    scope.fail_fatal(&e.to_string());
                } else {
                    scope.fail(&e.to_string());
                }
                Err(e)
            }
        }
    }

    fn open_pages(config: QueueConfig, mode: HeadMode) -> QueueResult<Self> {
        fs::create_dir_all(&config.dir).map_err(|e| QueueError::Io {
            path: config.dir.clone(),
            source: e,
        })?;
        let checkpoints = FileCheckpointIo::new(&config.dir);
        let head_name = checkpoints.head_file_name();

        if !checkpoints.exists(&head_name) {
            let io = FilePageIo::create(&config.dir, 0, config.page_capacity)?;
            let mut queue = Self {
                head: PageLifecycle::create_fresh_head(0, io),
                config,
                checkpoints,
                tails: Vec::new(),
                seq_num: 0,
                writes_since_checkpoint: 0,
                closed: false,
            };
            queue.checkpoint_head()?;
            return Ok(queue);
        }

        let head_checkpoint = checkpoints.read(&head_name)?;
        let mut seq_num = head_checkpoint.last_seq_num();

        let mut tails = Vec::new();
        for page_num in head_checkpoint.first_unacked_page_num()..head_checkpoint.page_num() {
            let name = checkpoints.tail_file_name(page_num);
            // Tails acknowledged out of order were purged already.
            if !checkpoints.exists(&name) {
                continue;
            }
            let checkpoint = checkpoints.read(&name)?;
            seq_num = seq_num.max(checkpoint.last_seq_num());

            if checkpoint.element_count() == 0 || checkpoint.is_fully_acked() {
                checkpoints.purge(&name)?;
                remove_page_file(&config.dir, page_num)?;
                log_event(Event::PagePurged, &[("page_num", &page_num.to_string())]);
                continue;
            }

            if !FilePageIo::exists(&config.dir, page_num) {
                return Err(QueueError::MissingPage { page_num });
            }
            let io = FilePageIo::open(&config.dir, page_num, config.page_capacity)?;
            tails.push(PageLifecycle::recover_tail(&checkpoint, io)?);
        }

        let head_num = head_checkpoint.page_num();
        remove_orphan_pages(&config.dir, &checkpoints, head_num)?;
        if !FilePageIo::exists(&config.dir, head_num) {
            return Err(QueueError::MissingPage { page_num: head_num });
        }
        let io = FilePageIo::recover(&config.dir, head_num, config.page_capacity)?;
        let head_checkpoint = reconcile_head_checkpoint(&checkpoints, head_checkpoint, &io)?;
        let head = PageLifecycle::recover_head(&head_checkpoint, io)?;
        seq_num = seq_num.max(head.max_seq_num().unwrap_or(0));

        let mut queue = Self {
            config,
            checkpoints,
            tails,
            head,
            seq_num,
            writes_since_checkpoint: 0,
            closed: false,
        };

        if mode == HeadMode::Seal && !queue.head.is_empty() {
            queue.rotate()?;
        } else {
            queue.checkpoint_head()?;
        }
        Ok(queue)
    }

    /// Appends an element and returns its sequence number.
    pub fn write(&mut self, data: &[u8]) -> QueueResult<u64> {
        self.ensure_open()?;
        let max = self.config.max_element_size();
        if data.len() > max {
            return Err(QueueError::ElementTooLarge {
                size: data.len(),
                max,
            });
        }

        if !self.head.has_space(data.len()) {
            self.rotate()?;
        }

        let seq_num = self.seq_num + 1;
        self.head.write(data, seq_num)?;
        self.seq_num = seq_num;
        self.writes_since_checkpoint += 1;

        maybe_crash(points::QUEUE_AFTER_WRITE_BEFORE_CHECKPOINT);

        if self.writes_since_checkpoint >= self.config.checkpoint_max_writes {
            self.checkpoint_head()?;
        }
        Ok(seq_num)
    }

    /// Hands out up to `limit` unread elements from the oldest page that has any.
    pub fn read_batch(&mut self, limit: usize) -> QueueResult<Batch> {
        self.ensure_open()?;
        let page = self
            .tails
            .iter_mut()
            .chain(std::iter::once(&mut self.head))
            .find(|page| !page.is_fully_read());

        match page {
            Some(page) => Ok(Batch::new(page.read(limit)?)),
            None => Ok(Batch::default()),
        }
    }

    /// Acknowledges elements. Fails without acknowledging anything if a
    /// sequence number is not held by the queue.
    pub fn ack(&mut self, seq_nums: &[u64]) -> QueueResult<()> {
        self.ensure_open()?;
        if let Some(&missing) = seq_nums.iter().find(|&&seq| self.page_holding(seq).is_none()) {
            return Err(QueueError::UnknownSequence(missing));
        }

        let mut touched = Vec::new();
        for &seq_num in seq_nums {
            let page = self.page_holding_mut(seq_num)?;
            page.ack(seq_num)?;
            if !page.is_head() && !touched.contains(&page.page_num()) {
                touched.push(page.page_num());
            }
        }

        let first_unacked_page_num = self.first_unacked_page_num();
        for tail in self.tails.iter().filter(|t| touched.contains(&t.page_num())) {
            if !tail.is_fully_acked() {
                let name = self.checkpoints.tail_file_name(tail.page_num());
                self.checkpoints
                    .write(&name, &tail.to_checkpoint(first_unacked_page_num))?;
            }
        }

        self.retire_acked_tails()?;
        self.checkpoint_head()
    }

    /// Persists and checkpoints the head, then releases every page.
    pub fn close(&mut self) -> QueueResult<()> {
        if self.closed {
            return Ok(());
        }
        self.checkpoint_head()?;
        self.closed = true;

        for tail in &mut self.tails {
            tail.close()?;
        }
        self.head.close()?;
        log_event(
            Event::QueueClosed,
            &[("dir", &self.config.dir.display().to_string())],
        );
        Ok(())
    }

    pub fn status(&self) -> QueueStatus {
        let pages: Vec<_> = self.pages().map(|p| p.status()).collect();
        QueueStatus {
            dir: self.config.dir.clone(),
            seq_num: self.seq_num,
            head_page_num: self.head.page_num(),
            first_unacked_page_num: self.first_unacked_page_num(),
            unacked_count: self
                .pages()
                .map(|p| p.element_count() as u64 - p.acked_count() as u64)
                .sum(),
            unread_count: self.pages().map(|p| p.unread_count()).sum(),
            pages,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Last assigned sequence number, 0 before the first write
    pub fn seq_num(&self) -> u64 {
        self.seq_num
    }

    pub fn head_page_num(&self) -> u32 {
        self.head.page_num()
    }

    /// Page numbers of the tail pages, oldest first
    pub fn tail_page_nums(&self) -> Vec<u32> {
        self.tails.iter().map(|t| t.page_num()).collect()
    }

    /// Returns true if no element is waiting for acknowledgment
    pub fn is_fully_acked(&self) -> bool {
        self.pages().all(|p| p.is_empty() || p.is_fully_acked())
    }

    fn pages(&self) -> impl Iterator<Item = &FilePage> {
        self.tails.iter().chain(std::iter::once(&self.head))
    }

    fn page_holding(&self, seq_num: u64) -> Option<&FilePage> {
        self.pages().find(|p| p.contains(seq_num))
    }

    fn page_holding_mut(&mut self, seq_num: u64) -> QueueResult<&mut FilePage> {
        self.tails
            .iter_mut()
            .chain(std::iter::once(&mut self.head))
            .find(|p| p.contains(seq_num))
            .ok_or(QueueError::UnknownSequence(seq_num))
    }

    fn first_unacked_page_num(&self) -> u32 {
        self.tails
            .first()
            .map_or(self.head.page_num(), |t| t.page_num())
    }

    fn ensure_open(&self) -> QueueResult<()> {
        if self.closed {
            Err(QueueError::Closed)
        } else {
            Ok(())
        }
    }

    /// Persists the head page and records its checkpoint.
    fn checkpoint_head(&mut self) -> QueueResult<()> {
        self.head.ensure_persisted()?;
        let checkpoint = self
            .head
            .to_checkpoint(self.first_unacked_page_num())
            .with_last_seq_num(self.seq_num);
        self.checkpoints
            .write(&self.checkpoints.head_file_name(), &checkpoint)?;
        self.writes_since_checkpoint = 0;
        Ok(())
    }

    /// Seals the head into a tail and starts a fresh head at the next page number.
    fn rotate(&mut self) -> QueueResult<()> {
        let page_num = self.head.page_num();
        self.head.behead()?;
        let tail_checkpoint = self.head.to_checkpoint(self.first_unacked_page_num());
        self.checkpoints
            .write(&self.checkpoints.tail_file_name(page_num), &tail_checkpoint)?;

        maybe_crash(points::QUEUE_ROTATE_AFTER_BEHEAD);

        let next = page_num + 1;
        let io = FilePageIo::create(&self.config.dir, next, self.config.page_capacity)?;
        let sealed = mem::replace(&mut self.head, PageLifecycle::create_fresh_head(next, io));
        self.tails.push(sealed);
        self.checkpoint_head()?;

        if self.retire_acked_tails()? {
            self.checkpoint_head()?;
        }
        Ok(())
    }

    /// Deletes fully acknowledged tails. Returns true if any was deleted.
    fn retire_acked_tails(&mut self) -> QueueResult<bool> {
        let mut retired = false;
        let mut index = 0;
        while index < self.tails.len() {
            if !self.tails[index].is_fully_acked() {
                index += 1;
                continue;
            }
            let tail = self.tails.remove(index);
            self.checkpoints
                .purge(&self.checkpoints.tail_file_name(tail.page_num()))?;
            maybe_crash(points::QUEUE_PURGE_BEFORE_PAGE_DELETE);
            tail.purge()?;
            retired = true;
        }
        Ok(retired)
    }
}

/// Rebuilds a head checkpoint that fell behind appends to its page file.
///
/// Appends are checkpointed every `checkpoint_max_writes` writes, so after a
/// crash the head page file may hold more elements than its checkpoint
/// records, starting at the same sequence number. Any other difference is
/// left for head recovery to reject.
fn reconcile_head_checkpoint(
    checkpoints: &FileCheckpointIo,
    checkpoint: Checkpoint,
    io: &FilePageIo,
) -> QueueResult<Checkpoint> {
    let same_start = checkpoint.element_count() == 0 || checkpoint.min_seq_num() == io.min_seq_num();
    if !same_start || io.element_count() <= checkpoint.element_count() {
        return Ok(checkpoint);
    }

    let first_unacked_seq_num = if checkpoint.element_count() == 0 {
        io.min_seq_num()
    } else {
        checkpoint.first_unacked_seq_num()
    };
    let rebuilt = Checkpoint::new(
        checkpoint.page_num(),
        checkpoint.first_unacked_page_num(),
        first_unacked_seq_num,
        io.min_seq_num(),
        io.element_count(),
    )?
    .with_last_seq_num(checkpoint.last_seq_num());

    log_event(
        Event::HeadCheckpointReconciled,
        &[
            ("page_num", &checkpoint.page_num().to_string()),
            ("checkpoint_element_count", &checkpoint.element_count().to_string()),
            ("storage_element_count", &io.element_count().to_string()),
        ],
    );
    checkpoints.write(&checkpoints.head_file_name(), &rebuilt)?;
    Ok(rebuilt)
}

/// Deletes `page.<n>` files below the head page with no `checkpoint.<n>`.
///
/// Purging deletes a tail's checkpoint before its page file, so a crash in
/// between leaves a page file nothing refers to.
fn remove_orphan_pages(dir: &Path, checkpoints: &FileCheckpointIo, head_num: u32) -> QueueResult<()> {
    let entries = fs::read_dir(dir).map_err(|e| QueueError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| QueueError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let name = entry.file_name();
        let page_num = match name.to_str().and_then(parse_page_file_name) {
            Some(page_num) if page_num < head_num => page_num,
            _ => continue,
        };
        if checkpoints.exists(&checkpoints.tail_file_name(page_num)) {
            continue;
        }

        remove_page_file(dir, page_num)?;
        log_event(Event::OrphanPageRemoved, &[("page_num", &page_num.to_string())]);
    }
    Ok(())
}

fn parse_page_file_name(name: &str) -> Option<u32> {
    let page_num = name.strip_prefix("page.")?.parse().ok()?;
    (page_file_name(page_num) == name).then_some(page_num)
}

fn remove_page_file(dir: &Path, page_num: u32) -> QueueResult<()> {
    let path = dir.join(page_file_name(page_num));
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(QueueError::Io { path, source: e }),
    }
}
