//! Queue configuration
//!
//! Loaded from a JSON file:
//!
//! ```json
//! { "dir": "/var/lib/ackqueue", "page_capacity": 67108864, "checkpoint_max_writes": 1 }
//! ```
//!
//! Only `dir` is required.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::page_io::{frame_size, PAGE_HEADER_SIZE};

use super::errors::{QueueError, QueueResult};

/// Queue configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Directory holding page files and checkpoints
    pub dir: PathBuf,

    /// Maximum page file size in bytes (default 64 MiB)
    #[serde(default = "default_page_capacity")]
    pub page_capacity: usize,

    /// Writes between head checkpoints (default 1, every write)
    #[serde(default = "default_checkpoint_max_writes")]
    pub checkpoint_max_writes: u32,
}

fn default_page_capacity() -> usize {
    64 * 1024 * 1024
}

fn default_checkpoint_max_writes() -> u32 {
    1
}

impl QueueConfig {
    /// Configuration with defaults for everything but the directory
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            page_capacity: default_page_capacity(),
            checkpoint_max_writes: default_checkpoint_max_writes(),
        }
    }

    pub fn with_page_capacity(mut self, page_capacity: usize) -> Self {
        self.page_capacity = page_capacity;
        self
    }

    pub fn with_checkpoint_max_writes(mut self, checkpoint_max_writes: u32) -> Self {
        self.checkpoint_max_writes = checkpoint_max_writes;
        self
    }

    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> QueueResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| QueueError::Config(format!("failed to read {}: {}", path.display(), e)))?;

        let config: QueueConfig = serde_json::from_str(&content)
            .map_err(|e| QueueError::Config(format!("invalid config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> QueueResult<()> {
        if self.dir.as_os_str().is_empty() {
            return Err(QueueError::Config("dir must not be empty".to_string()));
        }

        // A page must fit at least one empty element.
        let minimum = PAGE_HEADER_SIZE + frame_size(0);
        if self.page_capacity < minimum {
            return Err(QueueError::Config(format!(
                "page_capacity must be at least {} bytes, got {}",
                minimum, self.page_capacity
            )));
        }

        // Element lengths are framed as u32.
        let maximum = u32::MAX as u64 + minimum as u64;
        if self.page_capacity as u64 > maximum {
            return Err(QueueError::Config(format!(
                "page_capacity must be at most {} bytes, got {}",
                maximum, self.page_capacity
            )));
        }

        if self.checkpoint_max_writes == 0 {
            return Err(QueueError::Config(
                "checkpoint_max_writes must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Largest element payload a page can hold
    pub fn max_element_size(&self) -> usize {
        self.page_capacity
            .saturating_sub(PAGE_HEADER_SIZE + frame_size(0))
    }
}
