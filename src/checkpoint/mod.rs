//! Page checkpoints
//!
//! A checkpoint is the durable summary of one page:
//! `{page_num, first_unacked_page_num, first_unacked_seq_num, min_seq_num, element_count}`.
//! It is all that page recovery trusts about acknowledgment state. Only the
//! contiguous acknowledged prefix is recorded, through `first_unacked_seq_num`.
//!
//! # Durability
//!
//! - Every checkpoint carries a CRC32 and a version
//! - Writes are atomic (temp file, fsync, rename, directory fsync)
//! - A corrupted or out-of-range checkpoint is rejected on read

mod errors;
mod io;
mod record;

pub use errors::{CheckpointError, CheckpointResult};
pub use io::{CheckpointIo, FileCheckpointIo, HEAD_CHECKPOINT};
pub use record::{Checkpoint, CHECKPOINT_SIZE, CHECKPOINT_VERSION};
