//! Crash point injection for durability testing
//!
//! Setting `ACKQUEUE_CRASH_POINT=<name>` makes the process abort at the
//! matching point: no cleanup, no unwinding, no destructors. Tests run the
//! binary in a child process, let it die at a point, then reopen the queue
//! and check what survived.
//!
//! ```bash
//! ACKQUEUE_CRASH_POINT=checkpoint_before_rename ackqueue push --config q.json hello
//! ```

use std::sync::OnceLock;

/// Environment variable naming the active crash point
pub const CRASH_POINT_ENV: &str = "ACKQUEUE_CRASH_POINT";

static CRASH_POINT: OnceLock<Option<String>> = OnceLock::new();

#[inline]
fn configured() -> Option<&'static str> {
    CRASH_POINT
        .get_or_init(|| std::env::var(CRASH_POINT_ENV).ok())
        .as_deref()
}

/// Returns true if the named crash point is the configured one.
#[inline]
pub fn crash_point_enabled(name: &str) -> bool {
    configured() == Some(name)
}

/// Abort the process if the named crash point is enabled.
#[inline]
pub fn maybe_crash(name: &str) {
    if crash_point_enabled(name) {
        eprintln!("[CRASH] aborting at crash point: {}", name);
        std::process::abort();
    }
}

/// Crash point names
pub mod points {
    // Page data file
    pub const PAGE_AFTER_APPEND: &str = "page_after_append";
    pub const PAGE_BEFORE_FSYNC: &str = "page_before_fsync";

    // Checkpoint persistence
    pub const CHECKPOINT_BEFORE_RENAME: &str = "checkpoint_before_rename";
    pub const CHECKPOINT_AFTER_RENAME: &str = "checkpoint_after_rename";

    // Queue orchestration
    pub const QUEUE_AFTER_WRITE_BEFORE_CHECKPOINT: &str = "queue_after_write_before_checkpoint";
    pub const QUEUE_ROTATE_AFTER_BEHEAD: &str = "queue_rotate_after_behead";
    pub const QUEUE_PURGE_BEFORE_PAGE_DELETE: &str = "queue_purge_before_page_delete";

    /// All crash point names
    pub fn all() -> &'static [&'static str] {
        &[
            PAGE_AFTER_APPEND,
            PAGE_BEFORE_FSYNC,
            CHECKPOINT_BEFORE_RENAME,
            CHECKPOINT_AFTER_RENAME,
            QUEUE_AFTER_WRITE_BEFORE_CHECKPOINT,
            QUEUE_ROTATE_AFTER_BEHEAD,
            QUEUE_PURGE_BEFORE_PAGE_DELETE,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crash_point_disabled_by_default() {
        assert!(!crash_point_enabled("not_a_point"));
        maybe_crash("not_a_point");
    }

    #[test]
    fn test_crash_point_names_are_unique_snake_case() {
        let all = points::all();
        for (i, point) in all.iter().enumerate() {
            assert!(
                point.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "crash point '{}' should be lowercase with underscores",
                point
            );
            assert!(!all[i + 1..].contains(point), "duplicate crash point {}", point);
        }
    }
}
