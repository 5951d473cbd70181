//! Acknowledgment tracking for queue pages
//!
//! Each page tracks which of its elements were acknowledged with an
//! [`AckBitmap`]. Bit `i` stands for the element at `min_seq_num + i`.
//!
//! Only the contiguous acknowledged prefix survives a restart (through the
//! checkpoint's `first_unacked_seq_num`). Bits set beyond that prefix live in
//! memory only and are redelivered after a crash.

mod bitmap;

pub use bitmap::AckBitmap;
