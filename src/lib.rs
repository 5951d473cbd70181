//! ackqueue - a durable, crash-resistant FIFO queue with per-element
//! acknowledgment
//!
//! Elements are appended to page files on local disk. Each page has a
//! checkpoint recording how much of it is acknowledged. After a crash the
//! queue rebuilds its pages from those checkpoints and delivers every
//! element that was not acknowledged, possibly again.

pub mod ack;
pub mod checkpoint;
pub mod cli;
pub mod crash_point;
pub mod observability;
pub mod page;
pub mod page_io;
pub mod queue;
