//! File-backed page storage handle
//!
//! One file per page, `<dir>/page.<page_num>`, append-only. The file is
//! scanned once when opened so `min_seq_num` and `element_count` report
//! exactly what is durably present, independent of any checkpoint.
//!
//! Opening never modifies the file. Bytes of a torn trailing frame stay on
//! disk until the first append or fsync through the handle cuts them off.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::crash_point::{maybe_crash, points};
use crate::observability::{log_event, Event};

use super::errors::{PageIoError, PageIoResult};
use super::frame::{self, FrameDefect, PAGE_HEADER_SIZE, PAGE_VERSION};
use super::{Element, PageIo};

/// Returns the page data file name for `page_num`
pub fn page_file_name(page_num: u32) -> String {
    format!("page.{}", page_num)
}

/// Page data file on the local filesystem
#[derive(Debug)]
pub struct FilePageIo {
    path: PathBuf,
    page_num: u32,
    capacity: usize,
    file: Option<File>,
    min_seq_num: u64,
    element_count: u32,
    /// Byte offset of each frame, indexed by `seq_num - min_seq_num`
    offsets: Vec<u64>,
    /// Offset where the next frame is written
    head: u64,
    /// Length of the file on disk, beyond `head` while a torn frame remains
    file_len: u64,
    released: bool,
}

/// How strictly to treat a bad trailing frame when scanning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanMode {
    /// Any defect is corruption
    Strict,
    /// A defect in the final frame is a torn write and is cut off
    TruncateTornTail,
}

impl FilePageIo {
    /// Creates a new, empty page file, replacing any leftover file of the same name.
    ///
    /// The file and its directory are fsynced before returning.
    pub fn create(dir: &Path, page_num: u32, capacity: usize) -> PageIoResult<Self> {
        let path = dir.join(page_file_name(page_num));

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| PageIoError::io(&path, "failed to create page file", e))?;

        file.write_all(&[PAGE_VERSION])
            .map_err(|e| PageIoError::io(&path, "failed to write page header", e))?;
        file.sync_all()
            .map_err(|e| PageIoError::io(&path, "failed to fsync new page file", e))?;
        sync_dir(dir)?;

        Ok(Self {
            path,
            page_num,
            capacity,
            file: Some(file),
            min_seq_num: 0,
            element_count: 0,
            offsets: Vec::new(),
            head: PAGE_HEADER_SIZE as u64,
            file_len: PAGE_HEADER_SIZE as u64,
            released: false,
        })
    }

    /// Opens an existing page file, failing on any damaged frame.
    ///
    /// Used for sealed tail pages, which are never written after rotation.
    pub fn open(dir: &Path, page_num: u32, capacity: usize) -> PageIoResult<Self> {
        Self::open_with(dir, page_num, capacity, ScanMode::Strict)
    }

    /// Opens the page file of the head page, skipping a torn trailing frame.
    ///
    /// A crash mid-append leaves a partial or unchecksummed last frame; that
    /// element was never acknowledged to its producer and is not counted.
    /// Damage anywhere before the last frame is still corruption. The torn
    /// bytes are removed only once the handle is written or persisted, so a
    /// page rejected by head recovery keeps its file exactly as found.
    pub fn recover(dir: &Path, page_num: u32, capacity: usize) -> PageIoResult<Self> {
        Self::open_with(dir, page_num, capacity, ScanMode::TruncateTornTail)
    }

    /// Returns true if the page file exists in `dir`
    pub fn exists(dir: &Path, page_num: u32) -> bool {
        dir.join(page_file_name(page_num)).exists()
    }

    fn open_with(dir: &Path, page_num: u32, capacity: usize, mode: ScanMode) -> PageIoResult<Self> {
        let path = dir.join(page_file_name(page_num));

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| PageIoError::io(&path, "failed to open page file", e))?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|e| PageIoError::io(&path, "failed to read page file", e))?;

        let mut page = Self {
            capacity: capacity.max(bytes.len()),
            path,
            page_num,
            file: None,
            min_seq_num: 0,
            element_count: 0,
            offsets: Vec::new(),
            head: PAGE_HEADER_SIZE as u64,
            file_len: bytes.len() as u64,
            released: false,
        };

        page.scan(&bytes, mode)?;
        page.file = Some(file);
        Ok(page)
    }

    /// Scans frames, filling offsets and counters. `head` ends up at the end
    /// of the last valid frame.
    fn scan(&mut self, bytes: &[u8], mode: ScanMode) -> PageIoResult<()> {
        match bytes.first() {
            None => {
                return Err(PageIoError::Corrupted {
                    page_num: self.page_num,
                    offset: 0,
                    reason: "missing page header".to_string(),
                })
            }
            Some(&version) if version != PAGE_VERSION => {
                return Err(PageIoError::UnsupportedVersion {
                    page_num: self.page_num,
                    version,
                })
            }
            Some(_) => {}
        }

        let mut pos = PAGE_HEADER_SIZE;
        while pos < bytes.len() {
            let decoded = match frame::decode(&bytes[pos..]) {
                Ok(decoded) => decoded,
                Err(defect) => {
                    if mode == ScanMode::TruncateTornTail && is_torn_tail(&defect, &bytes[pos..]) {
                        break;
                    }
                    return Err(PageIoError::Corrupted {
                        page_num: self.page_num,
                        offset: pos as u64,
                        reason: defect.to_string(),
                    });
                }
            };

            if self.element_count == 0 {
                self.min_seq_num = decoded.seq_num;
            } else {
                let expected = self.min_seq_num + self.element_count as u64;
                if decoded.seq_num != expected {
                    return Err(PageIoError::NonContiguousSequence {
                        page_num: self.page_num,
                        expected,
                        actual: decoded.seq_num,
                    });
                }
            }

            self.offsets.push(pos as u64);
            self.element_count += 1;
            pos += decoded.len;
        }

        self.head = pos as u64;
        Ok(())
    }

    /// Truncates the file back to the last valid frame if a torn frame remains.
    fn cut_torn_tail(&mut self) -> PageIoResult<()> {
        if self.file_len <= self.head {
            return Ok(());
        }
        let (head, file_len, page_num) = (self.head, self.file_len, self.page_num);
        let path = self.path.clone();
        let file = self.active_file()?;
        file.set_len(head)
            .map_err(|e| PageIoError::io(&path, "failed to truncate torn frame", e))?;
        file.sync_all()
            .map_err(|e| PageIoError::io(&path, "failed to fsync truncated page", e))?;
        self.file_len = head;

        log_event(
            Event::PageTornWriteTruncated,
            &[
                ("page_num", &page_num.to_string()),
                ("dropped_bytes", &(file_len - head).to_string()),
            ],
        );
        Ok(())
    }

    fn active_file(&mut self) -> PageIoResult<&mut File> {
        if self.released {
            return Err(PageIoError::Released {
                page_num: self.page_num,
            });
        }
        self.file.as_mut().ok_or(PageIoError::Inactive {
            page_num: self.page_num,
        })
    }

    fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.head as usize)
    }

    fn frame_end(&self, index: usize) -> u64 {
        self.offsets.get(index + 1).copied().unwrap_or(self.head)
    }
}

/// A defect is a torn tail when the damaged frame runs to the end of the file.
fn is_torn_tail(defect: &FrameDefect, rest: &[u8]) -> bool {
    match defect {
        FrameDefect::Truncated { .. } => true,
        FrameDefect::ChecksumMismatch { .. } => match frame::decode_extent(rest) {
            Some(len) => len == rest.len(),
            None => true,
        },
    }
}

impl PageIo for FilePageIo {
    fn page_num(&self) -> u32 {
        self.page_num
    }

    fn min_seq_num(&self) -> u64 {
        self.min_seq_num
    }

    fn element_count(&self) -> u32 {
        self.element_count
    }

    fn has_space(&self, bytes: usize) -> bool {
        frame::frame_size(bytes) <= self.remaining()
    }

    fn write(&mut self, data: &[u8], seq_num: u64) -> PageIoResult<()> {
        let needed = frame::frame_size(data.len());
        if needed > self.remaining() {
            return Err(PageIoError::NoSpace {
                page_num: self.page_num,
                needed,
                remaining: self.remaining(),
            });
        }
        if self.element_count > 0 {
            let expected = self.min_seq_num + self.element_count as u64;
            if seq_num != expected {
                return Err(PageIoError::NonContiguousSequence {
                    page_num: self.page_num,
                    expected,
                    actual: seq_num,
                });
            }
        }

        self.cut_torn_tail()?;
        let head = self.head;
        let encoded = frame::encode(seq_num, data);
        let path = self.path.clone();
        let file = self.active_file()?;
        file.seek(SeekFrom::Start(head))
            .and_then(|_| file.write_all(&encoded))
            .map_err(|e| PageIoError::io(&path, "failed to append element", e))?;

        maybe_crash(points::PAGE_AFTER_APPEND);

        if self.element_count == 0 {
            self.min_seq_num = seq_num;
        }
        self.offsets.push(head);
        self.element_count += 1;
        self.head += encoded.len() as u64;
        self.file_len = self.head;
        Ok(())
    }

    fn read(&mut self, seq_num: u64, limit: usize) -> PageIoResult<Vec<Element>> {
        let end_seq = self.min_seq_num + self.element_count as u64;
        if self.element_count == 0 || seq_num < self.min_seq_num || seq_num >= end_seq {
            return Err(PageIoError::SequenceNotFound {
                page_num: self.page_num,
                seq_num,
            });
        }

        let first = (seq_num - self.min_seq_num) as usize;
        let last = (first + limit).min(self.element_count as usize);
        if first >= last {
            return Ok(Vec::new());
        }

        let start = self.offsets[first];
        let end = self.frame_end(last - 1);
        let mut buf = vec![0u8; (end - start) as usize];

        let path = self.path.clone();
        let page_num = self.page_num;
        let file = self.active_file()?;
        file.seek(SeekFrom::Start(start))
            .and_then(|_| file.read_exact(&mut buf))
            .map_err(|e| PageIoError::io(&path, "failed to read elements", e))?;

        let mut elements = Vec::with_capacity(last - first);
        let mut pos = 0;
        for expected in (seq_num..).take(last - first) {
            let decoded = frame::decode(&buf[pos..]).map_err(|defect| PageIoError::Corrupted {
                page_num,
                offset: start + pos as u64,
                reason: defect.to_string(),
            })?;
            if decoded.seq_num != expected {
                return Err(PageIoError::NonContiguousSequence {
                    page_num,
                    expected,
                    actual: decoded.seq_num,
                });
            }
            elements.push(Element {
                seq_num: decoded.seq_num,
                data: decoded.data.to_vec(),
            });
            pos += decoded.len;
        }
        Ok(elements)
    }

    fn activate(&mut self) -> PageIoResult<()> {
        if self.released {
            return Err(PageIoError::Released {
                page_num: self.page_num,
            });
        }
        if self.file.is_none() {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&self.path)
                .map_err(|e| PageIoError::io(&self.path, "failed to reopen page file", e))?;
            self.file = Some(file);
        }
        Ok(())
    }

    fn ensure_persisted(&mut self) -> PageIoResult<()> {
        self.cut_torn_tail()?;
        maybe_crash(points::PAGE_BEFORE_FSYNC);
        let path = self.path.clone();
        self.active_file()?
            .sync_data()
            .map_err(|e| PageIoError::io(&path, "failed to fsync page file", e))
    }

    fn release(&mut self) -> PageIoResult<()> {
        if self.released {
            return Err(PageIoError::Released {
                page_num: self.page_num,
            });
        }
        self.released = true;
        self.file = None;
        Ok(())
    }

    fn purge(&mut self) -> PageIoResult<()> {
        self.released = true;
        self.file = None;
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(PageIoError::io(&self.path, "failed to delete page file", e)),
        }
        if let Some(dir) = self.path.parent() {
            sync_dir(dir)?;
        }
        Ok(())
    }
}

fn sync_dir(dir: &Path) -> PageIoResult<()> {
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| PageIoError::io(dir, "failed to fsync page directory", e))
}
